//! Infragraph Entities: Translation of scanned state into canonical entities and graph construction

pub mod builder;
pub mod catalog;
pub mod entity;
pub mod translator;


pub use builder::{BuildError, BuildReport, GraphBuilder, Relationship};
pub use entity::{
    Audit, Coords, Dns, Encryption, Entity, GraphComponent, Healthcheck, Iam, LoadBalancerRef, Location,
    Network, ResourceComponent, Tags, TenantComponent,
};
pub use translator::{
    aws_tenant, decode, decode_items, region_location, Component, ComponentSet, ComponentSetBuilder, EntityRegistry,
    EntityTranslator, Translated, Translator, TranslatorError,
};
