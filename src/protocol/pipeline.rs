mod result_stream;

pub use result_stream::*;
