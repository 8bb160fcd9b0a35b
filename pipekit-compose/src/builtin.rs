//! Built-in components
//!
//! | Category | Names |
//! |:---------|:------|
//! | extractor | `identity`, `product` |
//! | head | `linear`, `mixture`, `mlp`, `dndf` |
//! | head_config | `linear/default`, `mixture/add`, `mixture/prod`, `mlp/default`, `dndf/default` |
//! | model | `linear`, `fcnn`, `dndf`, `mixture`, `concat` |

use pipekit_core::prelude::*;

use crate::aggregation::Aggregation;
use crate::extractors::{IdentityExtractor, ProductExtractor};
use crate::heads::{DndfHead, LinearHead, MixtureHead, MlpHead};
use crate::model::PipeSpec;
use crate::registry::{HeadContext, ModelDefinition, Registry};

fn identity(in_dim: usize) -> Result<Box<dyn Extractor>> {
    Ok(Box::new(IdentityExtractor::new(in_dim)))
}

fn product(in_dim: usize) -> Result<Box<dyn Extractor>> {
    Ok(Box::new(ProductExtractor::new(in_dim)))
}

fn linear(ctx: &HeadContext<'_>) -> Result<Box<dyn Head>> {
    Ok(Box::new(LinearHead::from_config(ctx.in_dim, ctx.out_dim, ctx.config)?))
}

fn mixture(ctx: &HeadContext<'_>) -> Result<Box<dyn Head>> {
    Ok(Box::new(MixtureHead::from_config(ctx.in_dim, ctx.out_dim, ctx.config)?))
}

fn mlp(ctx: &HeadContext<'_>) -> Result<Box<dyn Head>> {
    Ok(Box::new(MlpHead::from_config(ctx.in_dim, ctx.out_dim, ctx.config)?))
}

fn dndf(ctx: &HeadContext<'_>) -> Result<Box<dyn Head>> {
    Ok(Box::new(DndfHead::from_config(ctx.in_dim, ctx.out_dim, ctx.config)?))
}

/// Register every built-in extractor, head, head config and model
pub fn register_builtins(registry: &mut Registry) {
    registry.register_extractor("identity", identity);
    registry.register_extractor("product", product);

    registry.register_head("linear", linear);
    registry.register_head("mixture", mixture);
    registry.register_head("mlp", mlp);
    registry.register_head("dndf", dndf);

    registry.register_head_config("linear", "default", HeadConfig::new());
    registry.register_head_config("mixture", "add", HeadConfig::new().with("target_dim", 0));
    registry.register_head_config("mixture", "prod", HeadConfig::new().with("target_dim", 1));
    registry.register_head_config("mlp", "default", HeadConfig::new().with("num_units", vec![16]));
    registry.register_head_config(
        "dndf",
        "default",
        HeadConfig::new().with("num_tree", 10).with("tree_depth", 4),
    );

    registry.register_model(
        "linear",
        ModelDefinition::new(Aggregation::PassThrough)
            .with_pipe(PipeSpec::new("linear", "identity", "linear").with_head_config("default")),
    );
    registry.register_model(
        "fcnn",
        ModelDefinition::new(Aggregation::PassThrough)
            .with_pipe(PipeSpec::new("fcnn", "identity", "mlp").with_head_config("default")),
    );
    registry.register_model(
        "dndf",
        ModelDefinition::new(Aggregation::PassThrough)
            .with_pipe(PipeSpec::new("dndf", "identity", "dndf").with_head_config("default")),
    );
    registry.register_model(
        "mixture",
        ModelDefinition::new(Aggregation::Sum)
            .with_pipe(PipeSpec::new("add", "identity", "mixture").with_head_config("add"))
            .with_pipe(PipeSpec::new("prod", "product", "mixture").with_head_config("prod")),
    );
    registry.register_model("concat", ModelDefinition::new(Aggregation::Concat));

    tracing::debug!(components = registry.count(), "registered built-in components");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_names() {
        let registry = Registry::with_builtins();
        assert_eq!(registry.names(Category::Extractor), vec!["identity", "product"]);
        assert_eq!(registry.names(Category::Head), vec!["dndf", "linear", "mixture", "mlp"]);
        assert_eq!(
            registry.names(Category::Model),
            vec!["concat", "dndf", "fcnn", "linear", "mixture"]
        );
        assert_eq!(registry.count(), 16);
    }

    #[test]
    fn test_registering_twice_reports_conflicts() {
        let mut registry = Registry::with_builtins();
        let before = registry.count();
        register_builtins(&mut registry);
        assert_eq!(registry.count(), before);
        assert!(registry.register_extractor("identity", identity).is_some());
    }

    #[test]
    fn test_fcnn_builds_with_defaults() {
        let registry = Registry::with_builtins();
        let model = registry.build_model("fcnn", &[], Shape::new(4, 1)).unwrap();
        let head = model.pipe("fcnn").unwrap().head();
        assert_eq!(head.kind(), "mlp");
        // hidden: weight and four batch norm entries; output: weight and bias
        assert_eq!(head.parameters().len(), 7);
        assert_eq!(model.predict(&Matrix::zeros(3, 4)).unwrap().shape(), (3, 1));
    }

    #[test]
    fn test_dndf_builds_with_defaults() {
        let registry = Registry::with_builtins();
        let model = registry.build_model("dndf", &[], Shape::new(3, 2)).unwrap();
        let head = model.pipe("dndf").unwrap().head();
        assert_eq!(head.kind(), "dndf");
        // 10 trees of 31 internal nodes
        assert_eq!(head.parameters()[0].value.shape(), (310, 3));
        assert_eq!(head.parameters()[2].value.shape(), (320, 2));
        assert_eq!(model.predict(&Matrix::zeros(2, 3)).unwrap().shape(), (2, 2));
    }

    #[test]
    fn test_concat_needs_pipes() {
        let registry = Registry::with_builtins();
        assert!(matches!(
            registry.build_model("concat", &[], Shape::new(2, 2)),
            Err(PipeError::InvalidPipeline(_))
        ));
    }
}
