pub mod fields;
pub mod parser;
pub mod printer;
pub mod scope;
pub mod types;

pub use parser::parse;
pub use printer::print;
pub use types::{
    BasicQuery, Node, Operator, OperatorKind, Parameter, Pattern, PatternKind, SearchKind,
};
