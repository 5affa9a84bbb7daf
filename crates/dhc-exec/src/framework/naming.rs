use std::collections::BTreeMap;

use dhc_core::backend::LabelSelector;

pub const LABEL_INSTANCE: &str = "app.kubernetes.io/instance";
pub const LABEL_VERSION: &str = "app.kubernetes.io/version";
pub const LABEL_COMPONENT: &str = "app.kubernetes.io/component";
pub const LABEL_PART_OF: &str = "app.kubernetes.io/part-of";
pub const LABEL_MANAGED_BY: &str = "app.kubernetes.io/managed-by";

const PART_OF: &str = "dhcore-k8sjob";
const MANAGED_BY: &str = "dhcore";
const COMPONENT: &str = "job";

/// `j-<runtime>-<task>-<id>`. Also the poller key of the run.
pub fn job_name(runtime: &str, task: &str, id: &str) -> String {
    format!("j-{runtime}-{task}-{id}")
}

/// `c-<runtime>-<task>-<id>`.
pub fn container_name(runtime: &str, task: &str, id: &str) -> String {
    format!("c-{runtime}-{task}-{id}")
}

/// Labels stamped on every job this framework creates.
pub fn job_labels(job: &str, version: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (LABEL_INSTANCE.to_string(), format!("dhcore-{job}")),
        (LABEL_VERSION.to_string(), version.to_string()),
        (LABEL_COMPONENT.to_string(), COMPONENT.to_string()),
        (LABEL_PART_OF.to_string(), PART_OF.to_string()),
        (LABEL_MANAGED_BY.to_string(), MANAGED_BY.to_string()),
    ])
}

/// Selects every job created by this framework, whatever its version.
pub fn managed_selector() -> LabelSelector {
    LabelSelector::new()
        .with(LABEL_MANAGED_BY, MANAGED_BY)
        .with(LABEL_PART_OF, PART_OF)
        .with(LABEL_COMPONENT, COMPONENT)
}
