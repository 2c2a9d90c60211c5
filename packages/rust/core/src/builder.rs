//! Recipe builder: skeleton + step names → a wired, positioned recipe.

use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use recipeforge_document::{Element, Node};
use recipeforge_shared::{
    AppConfig, BuildConfig, CHAIN_END, CHAIN_START, FIRST_COMP_NO, LayoutConfig, MissingPolicy,
    RecipeForgeError, Result, ResultExt, TemplatesConfig, schema,
};

use crate::layout::{LayoutCursor, Position};
use crate::loader::{FragmentLoader, TemplateCache};
use crate::recipe::RecipeDocument;
use crate::registry::ComponentRegistry;

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Progress callback for reporting build status.
pub trait BuildProgress: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after a component has been inserted.
    fn step_inserted(&self, component: &InsertedComponent, current: usize, total: usize);
    /// Called when a step name is skipped under the `skip` policy.
    fn step_skipped(&self, name: &str);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl BuildProgress for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn step_inserted(&self, _component: &InsertedComponent, _current: usize, _total: usize) {}
    fn step_skipped(&self, _name: &str) {}
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// One component placed in the recipe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertedComponent {
    pub name: String,
    pub comp_no: i64,
    pub instance_id: String,
    pub guid: String,
    pub position: Position,
}

#[derive(Debug, Clone)]
pub struct BuildOutcome {
    pub recipe: RecipeDocument,
    pub operation_guid: String,
    pub inserted: Vec<InsertedComponent>,
    /// Step names left out under the `skip` policy.
    pub skipped: Vec<String>,
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builds recipes from a fixed configuration. One builder can serve many
/// builds; each build gets its own document and layout cursor.
pub struct RecipeBuilder {
    templates: TemplatesConfig,
    layout: LayoutConfig,
    settings: BuildConfig,
    registry: ComponentRegistry,
    cache: TemplateCache,
}

impl RecipeBuilder {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            templates: config.templates.clone(),
            layout: config.layout,
            settings: config.build.clone(),
            registry: ComponentRegistry::from_config(config),
            cache: TemplateCache::new(),
        }
    }

    pub fn with_missing_policy(mut self, policy: MissingPolicy) -> Self {
        self.settings.missing_component = policy;
        self
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    pub fn build(&self, steps: &[String]) -> Result<BuildOutcome> {
        self.build_with_progress(steps, &SilentProgress)
    }

    /// Build a recipe for `steps`, in order.
    ///
    /// Component `k` (counting inserted ones from 0) gets compNo `2 + k`. The
    /// chain runs `0 → 2 → … → last → -1`; with no components it is the single
    /// connector `0 → -1`.
    #[instrument(skip_all, fields(steps = steps.len(), policy = %self.settings.missing_component))]
    pub fn build_with_progress(
        &self,
        steps: &[String],
        progress: &dyn BuildProgress,
    ) -> Result<BuildOutcome> {
        progress.phase("Loading skeleton");
        let skeleton_path = self.templates.resolve(&self.templates.skeleton);
        let skeleton = self.cache.get_or_load(&skeleton_path)?;
        let mut recipe = RecipeDocument::new(
            (*skeleton).clone(),
            self.settings.operation_obj_type.as_str(),
            skeleton_path.display().to_string(),
        );
        let anchor_path = recipe.anchor_path()?;
        let operation_guid = Uuid::new_v4().to_string();

        let mut loader = FragmentLoader::new(
            &self.registry,
            &self.cache,
            LayoutCursor::new(self.layout),
            self.layout.label_offset,
        );
        let connector = loader
            .template(&self.templates.sequence_component)
            .while_processing(|| format!("sequence connector '{}'", self.templates.sequence_component))?;

        progress.phase("Inserting components");
        let mut nodes: Vec<Node> = Vec::with_capacity(steps.len() * 2 + 1);
        let mut inserted = Vec::with_capacity(steps.len());
        let mut skipped = Vec::new();
        let mut previous = CHAIN_START;
        let mut comp_no = FIRST_COMP_NO;

        for (index, name) in steps.iter().enumerate() {
            let subject = || format!("component '{name}' (step {})", index + 1);

            if *name == self.templates.sequence_component {
                return Err(RecipeForgeError::validation(format!(
                    "'{name}' is the sequence connector template, not a process step"
                ))
                .while_processing(subject()));
            }

            let fragment = match loader.load(name) {
                Ok(fragment) => fragment,
                Err(e)
                    if e.is_component_not_found()
                        && self.settings.missing_component == MissingPolicy::Skip =>
                {
                    warn!(component = %name, step = index + 1, "unknown component, skipping");
                    progress.step_skipped(name);
                    skipped.push(name.clone());
                    continue;
                }
                Err(e) => return Err(e.while_processing(subject())),
            };

            let guid = Uuid::new_v4().to_string();
            let instance_id = format!("{name}{comp_no}");
            let mut node = fragment.node;
            stamp_component(&mut node, comp_no, &instance_id, &guid, &operation_guid);

            nodes.push(link(&connector, previous, comp_no).into());
            nodes.push(node.into());
            debug!(component = %name, comp_no, %instance_id, "inserted component");

            let component = InsertedComponent {
                name: name.clone(),
                comp_no,
                instance_id,
                guid,
                position: fragment.position,
            };
            progress.step_inserted(&component, index + 1, steps.len());
            inserted.push(component);

            previous = comp_no;
            comp_no += 1;
        }
        nodes.push(link(&connector, previous, CHAIN_END).into());

        let anchor = recipe
            .root_mut()
            .at_path_mut(&anchor_path)
            .ok_or_else(|| {
                RecipeForgeError::anchor_not_found(
                    self.settings.operation_obj_type.as_str(),
                    skeleton_path.display().to_string(),
                )
            })?;
        anchor.set_attr(schema::GUID, operation_guid.as_str());
        anchor.insert_all(0, nodes);

        recipe.validate()?;

        info!(
            operation_guid = %operation_guid,
            inserted = inserted.len(),
            skipped = skipped.len(),
            "recipe built"
        );
        Ok(BuildOutcome {
            recipe,
            operation_guid,
            inserted,
            skipped,
        })
    }
}

/// Stamp identity onto a component copy and every data line inside it.
fn stamp_component(
    node: &mut Element,
    comp_no: i64,
    instance_id: &str,
    guid: &str,
    operation_guid: &str,
) {
    node.set_attr(schema::COMP_NO, comp_no.to_string());
    node.set_attr(schema::INSTANCE_ID, instance_id);
    node.set_attr(schema::GUID, guid);

    node.for_each_descendant_mut(
        |e| e.name == schema::DATA_LINE,
        &mut |line: &mut Element| {
            line.set_attr(schema::PARENT_GUID, operation_guid);
            line.set_attr(schema::GUID, guid);
        },
    );
}

fn link(template: &Element, from: i64, to: i64) -> Element {
    let mut connector = template.clone();
    connector.set_attr(schema::FROM_COMP_NO, from.to_string());
    connector.set_attr(schema::TO_COMP_NO, to.to_string());
    connector
}
