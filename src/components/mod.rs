//! Reusable components.
//!
//! | component           | ports                    | behaviour                                   |
//! |---------------------|--------------------------|---------------------------------------------|
//! | [`Function`]        | `in` → `out`             | runs a closure against its ports            |
//! | [`Debug`]           | `in` → `out`             | logs every node, forwards when connected    |
//! | [`Debounce`]        | `in` → `out`             | drops messages inside the window            |
//! | [`Watchdog`]        | `in` → `out`             | emits `"watchdog"` when input goes quiet    |
//! | [`InterruptInput`]  | `out`                    | samples a level each time it is notified    |
//! | [`InterfaceProvider`] | `interface`            | publishes a driver handle once, then parks  |

mod debounce;
mod debug;
mod function;
mod interface_provider;
mod interrupt;
mod watchdog;

pub use debounce::Debounce;
pub use debug::Debug;
pub use function::{Function, FunctionBody};
pub use interface_provider::InterfaceProvider;
pub use interrupt::InterruptInput;
pub use watchdog::Watchdog;

/// Name of the input port used by the pass-through components.
pub const IN: &str = "in";

/// Name of the output port used by the pass-through components.
pub const OUT: &str = "out";

/// Port a driver handle is published on.
pub const INTERFACE: &str = "interface";
