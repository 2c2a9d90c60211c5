//! End-to-end `build` pipeline: steps → recipe → (BOM) → attach → write → describe.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{info, instrument};

use recipeforge_bom::{
    AssembleOutcome, BlankMaterials, BomAssembler, BomDocument, MaterialCatalog, MaterialSource,
};
use recipeforge_shared::{AppConfig, Result, ResultExt};

use crate::attach::{AttachOutcome, BomAttacher};
use crate::builder::{BuildProgress, RecipeBuilder};
use crate::import::{ImportDescriptor, describe_for_import};

/// Where the BOM for a build comes from.
#[derive(Debug, Clone)]
pub enum BomRequest {
    /// A BOM document written earlier.
    Existing(PathBuf),
    /// Assemble one now.
    Assemble {
        name: Option<String>,
        materials: Vec<String>,
        /// JSON material catalog; without one every material gets template defaults.
        catalog: Option<PathBuf>,
        /// Also write the assembled BOM here.
        output: Option<PathBuf>,
    },
}

/// Configuration for one pipeline run.
#[derive(Debug, Clone)]
pub struct BuildRequest {
    /// Step names, in order.
    pub steps: Vec<String>,
    /// Output path for the recipe document.
    pub output: PathBuf,
    /// Optional BOM to attach.
    pub bom: Option<BomRequest>,
}

/// Result of the pipeline.
#[derive(Debug)]
pub struct BuildReport {
    pub output: PathBuf,
    pub operation_guid: String,
    pub components: usize,
    pub skipped_components: Vec<String>,
    pub skipped_materials: Vec<String>,
    pub attachment: Option<AttachOutcome>,
    pub descriptor: ImportDescriptor,
    pub elapsed: Duration,
}

/// Run the full pipeline.
///
/// 1. Build the recipe
/// 2. Load or assemble the BOM (if requested)
/// 3. Attach it at the configured anchor
/// 4. Write the recipe atomically
/// 5. Describe the written file for import
#[instrument(skip_all, fields(steps = request.steps.len(), output = %request.output.display()))]
pub fn run_build(
    config: &AppConfig,
    builder: &RecipeBuilder,
    request: &BuildRequest,
    progress: &dyn BuildProgress,
) -> Result<BuildReport> {
    let start = Instant::now();

    // --- Phase 1: Recipe ---
    let outcome = builder.build_with_progress(&request.steps, progress)?;
    let mut recipe = outcome.recipe;

    // --- Phase 2: BOM ---
    let mut skipped_materials = Vec::new();
    let bom = match &request.bom {
        None => None,
        Some(BomRequest::Existing(path)) => {
            progress.phase("Loading BOM");
            Some(BomDocument::from_path(path)?)
        }
        Some(BomRequest::Assemble {
            name,
            materials,
            catalog,
            output,
        }) => {
            progress.phase("Assembling BOM");
            let assembled = assemble_bom(config, name.as_deref(), materials, catalog.as_deref())?;
            skipped_materials = assembled.skipped;
            if let Some(path) = output {
                assembled.bom.write(path)?;
                info!(path = %path.display(), "wrote BOM");
            }
            Some(assembled.bom)
        }
    };

    // --- Phase 3: Attach ---
    let attachment = match &bom {
        Some(bom) => {
            progress.phase("Attaching BOM");
            Some(BomAttacher::from_config(config).attach(&mut recipe, bom)?)
        }
        None => None,
    };

    // --- Phase 4: Write ---
    progress.phase("Writing recipe");
    recipe
        .write(&request.output)
        .while_processing(|| format!("recipe output {}", request.output.display()))?;

    // --- Phase 5: Describe ---
    let descriptor = describe_for_import(&request.output, &config.bom)?;

    let elapsed = start.elapsed();
    info!(
        operation_guid = %outcome.operation_guid,
        components = outcome.inserted.len(),
        sha256 = %descriptor.sha256,
        elapsed_ms = elapsed.as_millis() as u64,
        "build pipeline complete"
    );

    Ok(BuildReport {
        output: request.output.clone(),
        operation_guid: outcome.operation_guid,
        components: outcome.inserted.len(),
        skipped_components: outcome.skipped,
        skipped_materials,
        attachment,
        descriptor,
        elapsed,
    })
}

/// Assemble a BOM with the configured templates, reading material metadata
/// from `catalog` when given.
pub fn assemble_bom(
    config: &AppConfig,
    name: Option<&str>,
    materials: &[String],
    catalog: Option<&Path>,
) -> Result<AssembleOutcome> {
    let assembler = BomAssembler::from_config(config)?;
    let catalog = catalog.map(MaterialCatalog::from_json_file).transpose()?;
    let source: &dyn MaterialSource = match &catalog {
        Some(catalog) => catalog,
        None => &BlankMaterials,
    };
    assembler.assemble(name, materials, source)
}

#[cfg(test)]
mod tests {
    use recipeforge_shared::{RecipeForgeError, TemplatesConfig};

    use super::*;
    use crate::builder::SilentProgress;
    use crate::recipe::RecipeDocument;

    fn config() -> AppConfig {
        let mut config = AppConfig::default();
        config.templates = TemplatesConfig::default()
            .with_root(Path::new(env!("CARGO_MANIFEST_DIR")).join("../../../templates"));
        config
    }

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("rf-pipeline-test-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn build_with_assembled_bom_writes_and_describes() {
        let config = config();
        let tmp = temp_dir();
        let catalog = tmp.join("materials.json");
        std::fs::write(
            &catalog,
            r#"{"M1": {"MATERIAL_DESC": "Water"}, "M2": {"INVENTORY_UOM": "kg"}}"#,
        )
        .unwrap();

        let request = BuildRequest {
            steps: vec!["operator_instruction".into(), "record_text".into()],
            output: tmp.join("out").join("recipe.xml"),
            bom: Some(BomRequest::Assemble {
                name: Some("B1".into()),
                materials: vec!["M1".into(), "M2".into(), "M3".into()],
                catalog: Some(catalog),
                output: Some(tmp.join("bom.xml")),
            }),
        };

        let builder = RecipeBuilder::new(&config);
        let report = run_build(&config, &builder, &request, &SilentProgress).unwrap();
        assert_eq!(report.components, 2);
        assert_eq!(report.skipped_materials, vec!["M3".to_string()]);
        assert_eq!(report.attachment.as_ref().map(|a| a.replaced), Some(false));
        assert_eq!(report.descriptor.obj_type, "PM_OPERATION");
        assert_eq!(report.descriptor.file_name, "recipe.xml");

        let written = RecipeDocument::from_path(&request.output, "PM_OPERATION").unwrap();
        assert!(written.validate().is_ok());
        assert_eq!(written.bom_refs().len(), 1);
        assert!(std::fs::read_to_string(&request.output).unwrap().starts_with("<eSpecXml"));

        let bom = BomDocument::from_path(&tmp.join("bom.xml")).unwrap();
        assert_eq!(bom.material_ids(), vec!["M1", "M2"]);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn existing_bom_can_be_attached() {
        let config = config();
        let tmp = temp_dir();
        let bom_path = tmp.join("bom.xml");
        assemble_bom(&config, Some("B7"), &["M1".to_string()], None)
            .unwrap()
            .bom
            .write(&bom_path)
            .unwrap();

        let request = BuildRequest {
            steps: Vec::new(),
            output: tmp.join("recipe.xml"),
            bom: Some(BomRequest::Existing(bom_path)),
        };
        let report =
            run_build(&config, &RecipeBuilder::new(&config), &request, &SilentProgress).unwrap();
        assert_eq!(report.components, 0);
        assert_eq!(report.attachment.map(|a| a.bom_id), Some("B7".to_string()));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn empty_material_list_writes_nothing() {
        let config = config();
        let tmp = temp_dir();
        let request = BuildRequest {
            steps: vec!["record_text".into()],
            output: tmp.join("recipe.xml"),
            bom: Some(BomRequest::Assemble {
                name: None,
                materials: Vec::new(),
                catalog: None,
                output: None,
            }),
        };

        let err = run_build(&config, &RecipeBuilder::new(&config), &request, &SilentProgress)
            .unwrap_err();
        assert!(matches!(err, RecipeForgeError::Validation { .. }));
        assert!(!request.output.exists());

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn bom_file_with_foreign_objects_is_rejected() {
        let config = config();
        let tmp = temp_dir();
        let bom_path = tmp.join("bom.xml");
        std::fs::write(
            &bom_path,
            r#"<eSpecXml><eSpecXmlObjs>
  <eProcObject objType="MM_BOM" id="B1" version="1.001"><eProcBomItem itemObjId="M1"/></eProcObject>
  <eProcObject objType="MM_OBJ" id="M1"/>
  <eProcObject objType="MM_UOM" id="KG"/>
</eSpecXmlObjs></eSpecXml>"#,
        )
        .unwrap();

        let request = BuildRequest {
            steps: vec!["record_text".into()],
            output: tmp.join("recipe.xml"),
            bom: Some(BomRequest::Existing(bom_path)),
        };
        let err = run_build(&config, &RecipeBuilder::new(&config), &request, &SilentProgress)
            .unwrap_err();
        assert!(matches!(err, RecipeForgeError::Validation { .. }));
        assert!(err.to_string().contains("MM_UOM"));
        assert!(!request.output.exists());

        let _ = std::fs::remove_dir_all(&tmp);
    }
}
