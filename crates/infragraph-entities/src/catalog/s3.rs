//! S3 buckets

use serde::{Deserialize, Serialize};

use crate::entity::{Audit, GraphComponent, ResourceComponent};
use crate::translator::{aws_tenant, decode_items, region_location, ComponentSet, Translated, Translator, TranslatorError};

pub const ENTITY_TYPE: &str = "aws-s3-bucket";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Bucket {
    pub name: String,
    #[serde(default)]
    pub creation_date: Option<String>,
}

fn bucket_arn<T>(v: &Translated<T>, name: &str) -> String {
    let partition = v.metadata.partition.as_deref().unwrap_or("aws");
    format!("arn:{partition}:s3:::{name}")
}

pub fn translator() -> Result<Translator<Bucket>, TranslatorError> {
    let components = ComponentSet::builder()
        .graph(|v: &Translated<Bucket>| {
            Some(GraphComponent {
                id: bucket_arn(v, &v.item.name),
                label: v.item.name.clone(),
                node_type: ENTITY_TYPE.to_string(),
                parent: Some(v.metadata.account.clone()),
                coords: None,
            })
        })
        .resource(|v: &Translated<Bucket>| {
            Some(ResourceComponent {
                id: bucket_arn(v, &v.item.name),
                name: v.item.name.clone(),
                category: "s3".to_string(),
                subcategory: Some("bucket".to_string()),
                description: None,
                policy: None,
            })
        })
        .tenant(aws_tenant)
        .location(region_location)
        .audit(|v: &Translated<Bucket>| {
            Some(Audit {
                created_at: Some(v.item.creation_date.clone()?),
                updated_at: None,
            })
        })
        .build()?;

    Ok(Translator::new(
        ENTITY_TYPE,
        "S3",
        "listBuckets",
        |record| decode_items::<Bucket>(record, "Buckets"),
        components,
    ))
}
