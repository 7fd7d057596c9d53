pub mod serve;
pub mod settings;
