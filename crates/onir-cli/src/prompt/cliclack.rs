use std::io::{self, Write};

use anyhow::Result;
use cliclack::{input, spinner};
use console::style;

use super::{Input, InputType, Prompt};

pub struct CliclackPrompt {
    spinner: Option<cliclack::ProgressBar>,
    input_mode: InputMode,
}

enum InputMode {
    Singleline,
    Multiline,
}

impl CliclackPrompt {
    pub fn new() -> Self {
        CliclackPrompt {
            spinner: None,
            input_mode: InputMode::Multiline,
        }
    }
}

impl Default for CliclackPrompt {
    fn default() -> Self {
        Self::new()
    }
}

fn flush() {
    // Nothing useful to do if the terminal went away
    let _ = io::stdout().flush();
}

impl Prompt for CliclackPrompt {
    fn get_input(&mut self) -> Result<Input> {
        let mut input = input("Onir:  [Help: /?]").placeholder("");
        if let InputMode::Multiline = self.input_mode {
            input = input.multiline();
        }
        let message_text: String = match input.interact() {
            Ok(text) => text,
            // Ctrl+C at the input prompt ends the session
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {
                return Ok(Input {
                    input_type: InputType::Exit,
                    content: None,
                })
            }
            Err(e) => return Err(e.into()),
        };
        let message_text = message_text.trim();

        if message_text.is_empty() {
            return Ok(Input {
                input_type: InputType::AskAgain,
                content: None,
            });
        }
        if message_text.eq_ignore_ascii_case("exit")
            || message_text.eq_ignore_ascii_case("/exit")
            || message_text.eq_ignore_ascii_case("/quit")
        {
            return Ok(Input {
                input_type: InputType::Exit,
                content: None,
            });
        }
        if message_text.eq_ignore_ascii_case("/m") {
            self.input_mode = InputMode::Multiline;
            return Ok(ask_again());
        }
        if message_text.eq_ignore_ascii_case("/s") {
            self.input_mode = InputMode::Singleline;
            return Ok(ask_again());
        }
        if message_text.eq_ignore_ascii_case("/?") {
            println!("Commands:");
            println!("exit - Exit the session");
            println!("/m - Switch to multiline input mode");
            println!("/s - Switch to singleline input mode");
            println!("/? - Display this help message");
            println!("Ctrl+C - Stop the reply in progress");
            return Ok(ask_again());
        }

        Ok(Input {
            input_type: InputType::Message,
            content: Some(message_text.to_string()),
        })
    }

    fn render_chunk(&mut self, text: &str) {
        self.hide_busy();
        print!("{}", text);
        flush();
    }

    fn end_reply(&mut self) {
        self.hide_busy();
        println!("\n");
        flush();
    }

    fn render_error(&mut self, message: &str) {
        self.hide_busy();
        println!("\n{} {}\n", style("Error:").red().bold(), message);
        flush();
    }

    fn render_notice(&mut self, message: &str) {
        self.hide_busy();
        println!("\n{}\n", style(message).dim());
        flush();
    }

    fn show_busy(&mut self) {
        let spin = spinner();
        spin.start("awaiting reply");
        self.spinner = Some(spin);
    }

    fn hide_busy(&mut self) {
        if let Some(spin) = self.spinner.take() {
            spin.stop("");
        }
    }

    fn close(&self) {
        // No cleanup required
    }

    #[cfg(test)]
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

fn ask_again() -> Input {
    Input {
        input_type: InputType::AskAgain,
        content: None,
    }
}
