//! The built-in generator catalog.
//!
//! One unit struct per generator, grouped by what they emit. [`all`] is the
//! single source of truth for which generators exist.

mod control_flow;
mod functions;
mod objects;
mod operators;
mod values;

use crate::rule::CodeGenerator;

/// Every built-in generator, in registration order.
pub fn all() -> Vec<Box<dyn CodeGenerator>> {
    let mut generators = Vec::new();
    generators.extend(values::all());
    generators.extend(objects::all());
    generators.extend(functions::all());
    generators.extend(operators::all());
    generators.extend(control_flow::all());
    generators
}
