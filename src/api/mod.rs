pub mod ollama;
pub mod pexels;
