pub mod inspect;
pub mod serve;
