//! One controller per action. Each is a fixed pipeline of stages over a resource; the
//! stages live beside the controller that owns them.

mod create;
mod delete;
mod list;
mod read;
mod render;
mod update;

pub use render::shape_instance;

use crate::config::{Action, EntityModel, Record, ResolvedModel, ResourceDescriptor};
use crate::pipeline::{Context, Pipeline, RequestView};
use crate::response::ResponseSink;
use crate::store::{coerce_param, parse_param, DataStore};
use std::sync::Arc;

/// Everything a stage needs besides the request: the resource, the resolved model for
/// search compilation, and the store.
#[derive(Clone)]
pub struct ResourceScope {
    pub resource: Arc<ResourceDescriptor>,
    pub model: Arc<ResolvedModel>,
    pub store: Arc<dyn DataStore>,
}

impl ResourceScope {
    pub fn new(resource: Arc<ResourceDescriptor>, model: Arc<ResolvedModel>, store: Arc<dyn DataStore>) -> Self {
        Self { resource, model, store }
    }

    pub fn entity(&self) -> &EntityModel {
        &self.resource.entity
    }

    /// Placeholder attributes of the endpoint serving `action`.
    pub fn endpoint_attributes(&self, action: Action) -> &[String] {
        self.resource
            .endpoint_for(action)
            .map(|t| t.attributes.as_slice())
            .unwrap_or(&[])
    }
}

pub struct Controller {
    action: Action,
    scope: ResourceScope,
    pipeline: Pipeline,
}

impl Controller {
    pub fn new(action: Action, scope: ResourceScope) -> Self {
        let pipeline = match action {
            Action::Create => create::pipeline(&scope),
            Action::Read => read::pipeline(&scope),
            Action::Update => update::pipeline(&scope),
            Action::Delete => delete::pipeline(&scope),
            Action::List => list::pipeline(&scope),
        };
        Self { action, scope, pipeline }
    }

    pub fn action(&self) -> Action {
        self.action
    }

    pub fn resource(&self) -> &ResourceDescriptor {
        &self.scope.resource
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.pipeline.stage_names()
    }

    pub async fn handle(&self, req: &RequestView) -> ResponseSink {
        self.run(req).await.0
    }

    /// Run the pipeline and keep the final context for inspection.
    pub async fn run(&self, req: &RequestView) -> (ResponseSink, Context) {
        tracing::debug!(
            action = %self.action,
            entity = %self.scope.resource.entity.name,
            "controller"
        );
        let ctx = Context::new(self.scope.resource.includes.clone());
        self.pipeline.run(req, ctx).await
    }
}

/// Body attributes overlaid with path parameters; a path value wins over a body value.
pub(crate) fn merge_attributes(entity: &EntityModel, endpoint_attributes: &[String], req: &RequestView) -> Record {
    let mut attributes = req.body.clone();
    attributes.extend(criteria_from_path(entity, endpoint_attributes, req));
    attributes
}

/// Lookup criteria for every endpoint placeholder present in the path.
pub(crate) fn criteria_from_path(entity: &EntityModel, endpoint_attributes: &[String], req: &RequestView) -> Record {
    endpoint_attributes
        .iter()
        .filter_map(|a| {
            req.path_params
                .get(a)
                .map(|raw| (a.clone(), coerce_param(entity, a, raw)))
        })
        .collect()
}

/// First path placeholder whose value is not valid for its declared type.
pub(crate) fn malformed_path_value<'r>(
    entity: &EntityModel,
    endpoint_attributes: &[String],
    req: &'r RequestView,
) -> Option<(&'r str, &'r str)> {
    endpoint_attributes.iter().find_map(|a| {
        let (name, raw) = req.path_params.get_key_value(a)?;
        parse_param(entity, a, raw).is_none().then_some((name.as_str(), raw.as_str()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AttributeInfo, AttributeType};
    use serde_json::json;
    use std::collections::HashMap;

    fn entity() -> EntityModel {
        let attr = |name: &str, type_| AttributeInfo {
            name: name.into(),
            type_,
            nullable: true,
            generated: false,
        };
        EntityModel {
            name: "membership".into(),
            schema_name: None,
            table_name: "memberships".into(),
            primary_key: "id".into(),
            attributes: vec![
                attr("id", AttributeType::Integer),
                attr("group_id", AttributeType::Integer),
                attr("role", AttributeType::Text),
            ],
            validation: HashMap::new(),
        }
    }

    #[test]
    fn path_values_take_precedence_over_body() {
        let mut body = Record::new();
        body.insert("group_id".into(), json!(99));
        body.insert("role".into(), json!("admin"));
        let req = RequestView::new().with_path_param("group_id", "7").with_body(body);
        let merged = merge_attributes(&entity(), &["group_id".to_string()], &req);
        assert_eq!(merged["group_id"], json!(7));
        assert_eq!(merged["role"], json!("admin"));
    }

    #[test]
    fn criteria_skip_missing_placeholders() {
        let req = RequestView::new().with_path_param("id", "3");
        let criteria = criteria_from_path(&entity(), &["group_id".to_string(), "id".to_string()], &req);
        assert_eq!(criteria.len(), 1);
        assert_eq!(criteria["id"], json!(3));
    }

    #[test]
    fn malformed_path_values_are_reported() {
        let attrs = ["group_id".to_string(), "role".to_string()];
        let req = RequestView::new().with_path_param("group_id", "seven").with_path_param("role", "x");
        assert_eq!(malformed_path_value(&entity(), &attrs, &req), Some(("group_id", "seven")));
        let req = RequestView::new().with_path_param("group_id", "7").with_path_param("role", "x");
        assert_eq!(malformed_path_value(&entity(), &attrs, &req), None);
    }
}
