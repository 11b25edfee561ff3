use anyhow::Result;

pub mod cliclack;

pub trait Prompt {
    fn get_input(&mut self) -> Result<Input>;
    /// Print a piece of the reply as soon as it arrives
    fn render_chunk(&mut self, text: &str);
    /// Called once the reply is complete
    fn end_reply(&mut self);
    fn render_error(&mut self, message: &str);
    fn render_notice(&mut self, message: &str);
    fn show_busy(&mut self);
    fn hide_busy(&mut self);
    fn close(&self);
    fn onir_ready(&self) {
        println!("\n");
        println!("Onir is running! Type a message, or \"exit\" to end the session.");
        println!("\n");
    }
    // Used for testing. Allows us to downcast to any type.
    #[cfg(test)]
    fn as_any(&self) -> &dyn std::any::Any;
}

pub struct Input {
    pub input_type: InputType,
    pub content: Option<String>, // Optional content as sometimes the user may be issuing a command eg. (Exit)
}

pub enum InputType {
    AskAgain, // Ask the user for input again. Control flow command.
    Message,  // User sent a message
    Exit,     // User wants to exit the session
}
