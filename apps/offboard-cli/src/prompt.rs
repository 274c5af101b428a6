//! Interactive confirmation for destructive revokes.

use std::io::IsTerminal;

use dialoguer::Confirm as ConfirmPrompt;
use offboard_core::Confirm;
use tracing::warn;

/// Checks if both stdin and stdout are connected to a terminal.
pub fn is_interactive_terminal() -> bool {
    std::io::stdin().is_terminal() && std::io::stdout().is_terminal()
}

/// Asks on the terminal; refuses when there is no terminal to ask on.
#[derive(Debug, Default)]
pub struct TerminalConfirm;

impl Confirm for TerminalConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        if !is_interactive_terminal() {
            warn!(prompt = %prompt, "No terminal for confirmation, declining");
            return false;
        }

        ConfirmPrompt::new()
            .with_prompt(prompt)
            .default(false)
            .interact()
            .unwrap_or(false)
    }
}
