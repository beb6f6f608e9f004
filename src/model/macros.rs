//! Macros for building model constraints

/// Create algebraic constraints using natural comparison syntax
///
/// The left-hand side must be in parentheses. Two-sided ranges put the
/// expression in the middle.
///
/// # Examples
///
/// ```rust
/// use mpconv::constraint;
/// use mpconv::model::{Model, VariableType};
///
/// let mut model = Model::new();
/// let x = model.add_variable(VariableType::Continuous, 0.0, 10.0);
/// let y = model.add_variable(VariableType::Continuous, 0.0, 10.0);
///
/// model.add_constraint(constraint!((x + y) == 10.0));
/// model.add_constraint(constraint!((2.0 * x) <= 5.0));
/// model.add_constraint(constraint!((x - y) >= 0.0));
/// model.add_constraint(constraint!(1.0 <= (x * y) <= 4.0));
/// ```
#[macro_export]
macro_rules! constraint {
    ($lower:literal <= ($body:expr) <= $upper:literal) => {
        $crate::model::Constraint::algebraic($body, $lower as f64, $upper as f64)
    };
    (($lhs:expr) == $rhs:expr) => {
        $crate::model::Constraint::eq($lhs, $rhs as f64)
    };
    (($lhs:expr) <= $rhs:expr) => {
        $crate::model::Constraint::le($lhs, $rhs as f64)
    };
    (($lhs:expr) >= $rhs:expr) => {
        $crate::model::Constraint::ge($lhs, $rhs as f64)
    };
}
