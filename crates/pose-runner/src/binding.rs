use crate::{DataType, Engine, InferError, ModelSpec};
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Input => write!(f, "input"),
            Direction::Output => write!(f, "output"),
        }
    }
}

/// One tensor slot of a compiled engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub index: usize,
    pub name: String,
    pub direction: Direction,
    /// Per-sample shape, batch axis excluded.
    pub dims: Vec<usize>,
    pub data_type: DataType,
}

impl Binding {
    pub fn is_input(&self) -> bool {
        self.direction == Direction::Input
    }

    pub fn volume(&self) -> usize {
        self.dims.iter().product()
    }

    pub fn element_size(&self) -> usize {
        self.data_type.size()
    }

    /// Bytes of one sample.
    pub fn row_bytes(&self) -> usize {
        self.volume() * self.element_size()
    }

    /// Bytes of `batch_size` samples.
    pub fn batch_bytes(&self, batch_size: usize) -> usize {
        batch_size * self.row_bytes()
    }
}

pub fn format_dims(dims: &[usize]) -> String {
    let joined = dims
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    format!("({joined})")
}

/// Query the engine for every binding, in index order.
pub fn resolve_bindings(engine: &dyn Engine) -> Result<Vec<Binding>, InferError> {
    let _scope = pose_base::TraceScope::new("resolve_bindings");
    let mut bindings = Vec::with_capacity(engine.binding_count());

    for index in 0..engine.binding_count() {
        let name = engine.binding_name(index).to_string();
        let code = engine.binding_data_type(index);
        let data_type = DataType::from_code(code).ok_or_else(|| {
            InferError::UnsupportedDataType {
                binding: name.clone(),
                code,
            }
        })?;

        let raw_dims = engine.binding_dims(index);
        let dims = raw_dims
            .iter()
            .map(|&d| usize::try_from(d).ok().filter(|&d| d > 0))
            .collect::<Option<Vec<usize>>>()
            .ok_or_else(|| InferError::InvalidSpec(format!(
                "binding '{name}' has unresolved dimensions {raw_dims:?}"
            )))?;

        let direction = if engine.binding_is_input(index) {
            Direction::Input
        } else {
            Direction::Output
        };

        log::info!(
            "binding {index}: name: {name} {direction} type {data_type} {}",
            format_dims(&dims)
        );

        bindings.push(Binding {
            index,
            name,
            direction,
            dims,
            data_type,
        });
    }

    Ok(bindings)
}

/// Inputs must be exactly the declared inputs (in any order) and every
/// declared output must be bound.
pub fn check_declared(bindings: &[Binding], spec: &ModelSpec) -> Result<(), InferError> {
    let bound_inputs: Vec<&str> = bindings
        .iter()
        .filter(|b| b.is_input())
        .map(|b| b.name.as_str())
        .collect();
    let declared: HashSet<&str> = spec.inputs().iter().map(|i| i.name.as_str()).collect();
    let bound: HashSet<&str> = bound_inputs.iter().copied().collect();

    if bound_inputs.len() != spec.inputs().len() || bound != declared {
        return Err(InferError::InvalidSpec(format!(
            "engine inputs {bound_inputs:?} are not a permutation of declared inputs {:?}",
            spec.inputs().iter().map(|i| &i.name).collect::<Vec<_>>()
        )));
    }

    for output in spec.outputs() {
        let found = bindings
            .iter()
            .any(|b| !b.is_input() && &b.name == output);
        if !found {
            return Err(InferError::InvalidSpec(format!(
                "declared output '{output}' is not bound by the engine"
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binding(index: usize, name: &str, direction: Direction, dims: &[usize]) -> Binding {
        Binding {
            index,
            name: name.to_string(),
            direction,
            dims: dims.to_vec(),
            data_type: DataType::Float32,
        }
    }

    #[test]
    fn test_binding_sizes() {
        let mut b = binding(0, "image", Direction::Input, &[3, 256, 192]);
        assert_eq!(b.volume(), 147456);
        assert_eq!(b.row_bytes(), 147456 * 4);
        assert_eq!(b.batch_bytes(2), 2 * 147456 * 4);
        b.data_type = DataType::Float16;
        assert_eq!(b.row_bytes(), 147456 * 2);
    }

    #[test]
    fn test_format_dims() {
        assert_eq!(format_dims(&[3, 256, 192]), "(3, 256, 192)");
        assert_eq!(format_dims(&[]), "()");
    }

    #[test]
    fn test_check_declared_accepts_permutation() {
        let spec = ModelSpec::new("m")
            .with_input("a", [1, 1, 1])
            .with_input("b", [1, 1, 1])
            .with_output("y");
        let bindings = vec![
            binding(0, "b", Direction::Input, &[1, 1, 1]),
            binding(1, "y", Direction::Output, &[4]),
            binding(2, "a", Direction::Input, &[1, 1, 1]),
            binding(3, "extra", Direction::Output, &[2]),
        ];
        assert!(check_declared(&bindings, &spec).is_ok());
    }

    #[test]
    fn test_check_declared_rejects_unknown_input() {
        let spec = ModelSpec::new("m").with_input("a", [1, 1, 1]).with_output("y");
        let bindings = vec![
            binding(0, "z", Direction::Input, &[1, 1, 1]),
            binding(1, "y", Direction::Output, &[4]),
        ];
        assert!(matches!(
            check_declared(&bindings, &spec),
            Err(InferError::InvalidSpec(_))
        ));
    }

    #[test]
    fn test_check_declared_rejects_missing_output() {
        let spec = ModelSpec::new("m").with_input("a", [1, 1, 1]).with_output("y");
        let bindings = vec![binding(0, "a", Direction::Input, &[1, 1, 1])];
        let err = check_declared(&bindings, &spec).unwrap_err();
        assert!(err.to_string().contains("'y'"));
    }
}
