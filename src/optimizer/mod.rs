//! Constant folding over JVM method bodies.
//!
//! This module sits on top of the instruction model:
//!
//! - [`crate::assembly`] - code array ↔ instruction stream, stack analysis
//! - [`optimizer`](self) - fold passes, method and class drivers, events
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                       Optimizer Pipeline                         │
//! ├──────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  Optimizer                   Class driver                        │
//! │    ├─ working pool copy       (append-only, shared by methods)   │
//! │    ├─ method-local aborts     (method kept as parsed)            │
//! │    └─ EventLog                                                   │
//! │                                                                  │
//! │  PassScheduler               Per-method fixpoint                 │
//! │    └─ decode → fold until stable → encode → max_stack/locals     │
//! │                                                                  │
//! │  FoldPass trait              One fold attempt per call           │
//! │    ├─ ArithmeticFold          operand operand op → ldc           │
//! │    └─ ComparisonFold          boolean materialization → iconst   │
//! │                                                                  │
//! │  matcher / resolver          Shape scan, backward load lookup    │
//! │  numeric                     JVM arithmetic on literals          │
//! │                                                                  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust
//! use classfold::metadata::{ClassModel, Code, Method, MethodAccessFlags};
//! use classfold::optimizer::{EventKind, Optimizer};
//!
//! let mut class = ClassModel::new("demo/Flags");
//! // iconst_5 iconst_3 if_icmpge +7 iconst_1 goto +4 iconst_0 ireturn
//! class.methods.push(
//!     Method::new("check", "()Z", MethodAccessFlags::STATIC).with_code(Code::new(
//!         2,
//!         0,
//!         vec![0x08, 0x06, 0xA2, 0x00, 0x07, 0x04, 0xA7, 0x00, 0x04, 0x03, 0xAC],
//!     )),
//! );
//!
//! let optimizer = Optimizer::default();
//! let optimized = optimizer.optimize_class(&class)?;
//!
//! // iconst_0 ireturn
//! assert_eq!(optimized.methods[0].code.as_ref().unwrap().code, vec![0x03, 0xAC]);
//! assert!(optimizer.events().has(EventKind::ComparisonFolded));
//! # Ok::<(), classfold::Error>(())
//! ```

mod arithmetic;
mod class;
mod comparison;
mod config;
mod context;
mod events;
mod matcher;
mod method;
pub mod numeric;
mod pass;
mod resolver;

pub use arithmetic::ArithmeticFold;
pub use class::{optimize_class, Optimizer};
pub use comparison::ComparisonFold;
pub use config::OptimizerConfig;
pub use context::MethodContext;
pub use events::{DerivedStats, Event, EventBuilder, EventKind, EventLog, EventLogIter};
pub use matcher::{
    find_arithmetic, find_comparison, is_operand, match_arithmetic_at, match_comparison_at,
    ArithmeticMatch, ComparisonMatch,
};
pub use method::{optimize_method, PassScheduler};
pub use pass::FoldPass;
pub use resolver::{operand_value, resolve_load_signature, resolve_load_value};
