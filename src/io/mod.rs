mod hmetis;

pub use hmetis::parse_hmetis;
