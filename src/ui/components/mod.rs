mod input;

pub use input::{InputKind, InputResult, TextInput};
