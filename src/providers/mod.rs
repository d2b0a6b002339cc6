pub mod caching;
pub mod cvm;
pub mod util;

pub use caching::CachingFetcher;
pub use cvm::CvmProvider;
