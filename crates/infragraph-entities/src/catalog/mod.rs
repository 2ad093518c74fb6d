//! Built-in AWS translators and relationship rules

pub mod account;
pub mod ec2;
pub mod elbv2;
pub mod lambda;
pub mod route53;
pub mod s3;
pub mod sqs;

use infragraph_state::QueryError;

use crate::builder::Relationship;
use crate::translator::{EntityRegistry, TranslatorError};

/// Registry with every built-in translator.
pub fn registry() -> Result<EntityRegistry, TranslatorError> {
    let mut registry = EntityRegistry::new();
    registry.register(ec2::vpc_translator()?)?;
    registry.register(ec2::subnet_translator()?)?;
    registry.register(lambda::translator()?)?;
    registry.register(s3::translator()?)?;
    registry.register(sqs::translator()?)?;
    registry.register(elbv2::translator()?)?;
    registry.register(route53::translator()?)?;
    Ok(registry)
}

/// Edges between built-in entity types.
pub fn relationships() -> Result<Vec<Relationship>, QueryError> {
    Ok(vec![
        Relationship::new(
            "alias",
            route53::ENTITY_TYPE,
            "loadBalancers[].dnsName",
            elbv2::ENTITY_TYPE,
            "dns.names[]",
        )?,
        Relationship::new(
            "deployed-in",
            elbv2::ENTITY_TYPE,
            "network.subnetIds[]",
            ec2::SUBNET_TYPE,
            "resource.id",
        )?,
        Relationship::new(
            "deployed-in",
            lambda::ENTITY_TYPE,
            "network.subnetIds[]",
            ec2::SUBNET_TYPE,
            "resource.id",
        )?,
        Relationship::new(
            "dead-letter",
            lambda::ENTITY_TYPE,
            "raw.DeadLetterConfig.TargetArn",
            sqs::ENTITY_TYPE,
            "resource.id",
        )?,
        Relationship::new(
            "dead-letter",
            sqs::ENTITY_TYPE,
            "raw.DeadLetterTargetArn",
            sqs::ENTITY_TYPE,
            "resource.id",
        )?,
    ])
}

/// Lowercase, without the root dot or a `dualstack.` prefix.
pub(crate) fn normalize_dns(name: &str) -> String {
    let name = name.trim().trim_end_matches('.').to_ascii_lowercase();
    match name.strip_prefix("dualstack.") {
        Some(rest) => rest.to_string(),
        None => name,
    }
}

/// Last `:` or `/` separated segment of an ARN.
pub(crate) fn arn_name(arn: &str) -> &str {
    arn.rsplit([':', '/']).next().unwrap_or(arn)
}
