//! Check sizes of key types.

use mpack_core::{KeyValuePair, PayloadRef, UnpackError, Value};
use std::mem::{align_of, size_of};

fn main() {
    println!("=== Type Sizes ===");
    println!("Value: {} bytes (align {})", size_of::<Value>(), align_of::<Value>());
    println!("KeyValuePair: {} bytes", size_of::<KeyValuePair>());
    println!("PayloadRef: {} bytes", size_of::<PayloadRef>());
    println!("Option<Value>: {} bytes", size_of::<Option<Value>>());
    println!("UnpackError: {} bytes", size_of::<UnpackError>());
}
