use std::rc::Rc;

use crate::error::{Error, Result};
use crate::factory::{Factory, FactoryRegistry, Members};

/// A probability distribution over the reals.
pub trait Distribution {
    fn mean(&self) -> f64;
    fn describe(&self) -> String;
}

struct Uniform {
    low: f64,
    high: f64,
}

impl Distribution for Uniform {
    fn mean(&self) -> f64 {
        (self.low + self.high) / 2.0
    }

    fn describe(&self) -> String {
        format!("Uniform({}, {})", self.low, self.high)
    }
}

struct Normal {
    mean: f64,
    stddev: f64,
}

impl Distribution for Normal {
    fn mean(&self) -> f64 {
        self.mean
    }

    fn describe(&self) -> String {
        format!("Normal({}, {})", self.mean, self.stddev)
    }
}

struct Mixture {
    components: Vec<Rc<dyn Distribution>>,
    weights: Vec<f64>,
}

impl Distribution for Mixture {
    fn mean(&self) -> f64 {
        let total: f64 = self.weights.iter().sum();
        self.components
            .iter()
            .zip(&self.weights)
            .map(|(component, weight)| component.mean() * weight / total)
            .sum()
    }

    fn describe(&self) -> String {
        let parts: Vec<String> = self
            .components
            .iter()
            .zip(&self.weights)
            .map(|(component, weight)| format!("{} * {}", weight, component.describe()))
            .collect();
        format!("Mixture({})", parts.join(" + "))
    }
}

fn construct_error<T>(concrete_name: &str, message: impl Into<String>) -> Result<T> {
    Err(Error::Construct {
        concrete_name: concrete_name.to_string(),
        message: message.into(),
    })
}

fn uniform(members: &Members) -> Result<Rc<dyn Distribution>> {
    let low = members.get_or("low", 0.0)?;
    let high = members.get_or("high", 1.0)?;
    if low > high {
        return construct_error("Uniform", format!("low {} exceeds high {}", low, high));
    }
    let uniform: Rc<dyn Distribution> = Rc::new(Uniform { low, high });
    Ok(uniform)
}

fn normal(members: &Members) -> Result<Rc<dyn Distribution>> {
    let mean = members.get_or("mean", 0.0)?;
    let stddev = members.get_or("stddev", 1.0)?;
    if stddev < 0.0 {
        return construct_error("Normal", format!("negative stddev {}", stddev));
    }
    let normal: Rc<dyn Distribution> = Rc::new(Normal { mean, stddev });
    Ok(normal)
}

fn mixture(members: &Members) -> Result<Rc<dyn Distribution>> {
    let components: Vec<Rc<dyn Distribution>> = members.get("components")?;
    let weights = members.get_or("weights", vec![1.0; components.len()])?;

    if components.is_empty() {
        return construct_error("Mixture", "no components");
    }
    if weights.len() != components.len() {
        return construct_error(
            "Mixture",
            format!(
                "{} weights for {} components",
                weights.len(),
                components.len()
            ),
        );
    }
    if weights.iter().any(|w| *w < 0.0) || weights.iter().sum::<f64>() <= 0.0 {
        return construct_error("Mixture", "weights must be non-negative with a positive sum");
    }

    let mixture: Rc<dyn Distribution> = Rc::new(Mixture {
        components,
        weights,
    });
    Ok(mixture)
}

pub fn create_standard_registry() -> Result<Rc<FactoryRegistry>> {
    let distributions = Factory::<dyn Distribution>::new("Distribution")
        .add("Uniform", &[("low", "double"), ("high", "double")], uniform)
        .add("Normal", &[("mean", "double"), ("stddev", "double")], normal)
        .add(
            "Mixture",
            &[("components", "Distribution[]"), ("weights", "double[]")],
            mixture,
        );

    let mut registry = FactoryRegistry::new();
    registry.register(distributions)?;
    Ok(Rc::new(registry))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::Interpreter;

    fn interpreter() -> Result<Interpreter> {
        Ok(Interpreter::with_factories(create_standard_registry()?))
    }

    #[test]
    fn test_standard_distributions() -> Result<()> {
        let mut interpreter = interpreter()?;
        interpreter.eval_str(
            r#"
            u = Uniform(low(2), high(4));
            Distribution n = Normal(mean(-1.5));
            m = Mixture(components({ u, n }), weights({ 3, 1 }));
            Distribution[] all = { u, Uniform() };
            "#,
        )?;

        let u = interpreter.get::<Rc<dyn Distribution>>("u")?;
        assert_eq!(u.mean(), 3.0);
        assert_eq!(u.describe(), "Uniform(2, 4)");
        assert_eq!(interpreter.get::<Rc<dyn Distribution>>("n")?.describe(), "Normal(-1.5, 1)");
        assert_eq!(interpreter.get::<Rc<dyn Distribution>>("m")?.mean(), 1.875);
        assert_eq!(interpreter.env().get_type("m")?, "Distribution");

        let all = interpreter.get::<Vec<Rc<dyn Distribution>>>("all")?;
        assert!(Rc::ptr_eq(&all[0], &u));
        assert_eq!(all[1].mean(), 0.5);
        Ok(())
    }

    #[test]
    fn test_equal_weights_by_default() -> Result<()> {
        let mut interpreter = interpreter()?;
        interpreter.eval_str("m = Mixture(components({ Normal(mean(1)), Normal(mean(3)) }));")?;
        assert_eq!(interpreter.get::<Rc<dyn Distribution>>("m")?.mean(), 2.0);
        Ok(())
    }

    #[test]
    fn test_invalid_parameters() -> Result<()> {
        let cases = [
            "u = Uniform(low(1), high(0));",
            "n = Normal(stddev(-1));",
            "m = Mixture(components({}));",
            "m = Mixture(components({ Uniform() }), weights({ 1, 2 }));",
            "m = Mixture(components({ Uniform() }), weights({ 0 }));",
        ];
        for source in cases {
            let mut interpreter = interpreter()?;
            let result = interpreter.eval_str(source);
            assert!(matches!(result, Err(Error::Construct { .. })), "{}", source);
            assert!(!interpreter.env().defined("u"));
            assert!(!interpreter.env().defined("m"));
        }

        assert!(matches!(
            interpreter()?.eval_str("m = Mixture();"),
            Err(Error::NotFound { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_registry_listing() -> Result<()> {
        let mut out = Vec::new();
        create_standard_registry()?.print(&mut out)?;
        assert_eq!(
            String::from_utf8_lossy(&out),
            "Distribution: Uniform, Normal, Mixture\n"
        );
        Ok(())
    }
}
