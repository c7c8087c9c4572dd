pub mod dense;
pub mod hybrid;
pub mod lexical;
