pub mod controls;
pub mod export;
pub mod text_input;
