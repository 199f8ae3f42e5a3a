pub mod autofill;
pub mod browser;
pub mod error;
pub mod fields;
pub mod session;
pub mod values;

//  Re-export commonly used items
pub use autofill::{Autofill, Config, RunState, Verdict, DEFAULT_MAX_LOOPS};
pub use browser::chrome::{ChromeDriver, ConnectionMode};
pub use error::AutofillError;
pub use fields::FieldCompleter;
pub use session::{ElementRef, FormSession};
pub use values::{FieldKind, FieldValue, StaticValues, ValueSource};
