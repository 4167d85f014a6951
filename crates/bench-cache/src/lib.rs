mod intern;
mod token;

pub use intern::InterningCache;
pub use token::CacheToken;
