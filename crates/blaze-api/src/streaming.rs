use std::pin::Pin;
use tokio_stream::Stream;

use crate::{StoreError, Value};

/// Stream of full values at a subscribed path.
///
/// Each item is the complete current value at the path (not a delta). The
/// stream ends when the store terminates the listener; dropping it releases
/// the listener.
pub type ValueStream = Pin<Box<dyn Stream<Item = Result<Value, StoreError>> + Send>>;
