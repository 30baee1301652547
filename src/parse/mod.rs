mod languages;
mod walker;

pub use languages::Language;
pub use walker::FileWalker;
