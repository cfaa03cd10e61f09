use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

use super::{DocumentError, PlanSummary, Recipient};
use crate::config::DocumentConfig;

pub const MANUAL_TEMPLATE_FILE: &str = "manual.pdf";

const FONT_RESOURCE: &str = "FManual";
const FONT_SIZE: i64 = 18;
const NAME_POSITION: (i64, i64) = (75, 640);
const TITLE_POSITION: (i64, i64) = (75, 600);

/// Builds the personalised plan manual from a fixed template PDF
#[derive(Debug, Clone)]
pub struct ManualGenerator {
    template_dir: PathBuf,
    output_dir: PathBuf,
}

impl ManualGenerator {
    pub fn new(template_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            template_dir: template_dir.into(),
            output_dir: output_dir.into(),
        }
    }

    pub fn from_config(config: &DocumentConfig) -> Self {
        Self::new(&config.template_dir, &config.output_dir)
    }

    pub fn template_path(&self) -> PathBuf {
        self.template_dir.join(MANUAL_TEMPLATE_FILE)
    }

    /// Where the manual for `user_id` is written
    pub fn output_path(&self, user_id: uuid::Uuid) -> PathBuf {
        self.output_dir.join(format!("{user_id}_manual.pdf"))
    }

    /// Generate the manual and return the path of the written file.
    ///
    /// The first page of the template is kept and overlaid with the
    /// recipient's full name and the plan title. Output is written to a
    /// temporary file and renamed into place, so a failed run never leaves a
    /// file behind at the final path.
    pub async fn generate(
        &self,
        user: &Recipient,
        plan: &PlanSummary,
    ) -> Result<PathBuf, DocumentError> {
        let template = self.template_path();
        let output = self.output_path(user.id);
        let name = user.full_name();
        let title = format!("{} Guide", plan.name);

        debug!(user_id = %user.id, plan = %plan.name, "Generating manual");
        let started = Instant::now();

        let path = tokio::task::spawn_blocking(move || render_manual(&template, &output, &name, &title))
            .await
            .map_err(|e| DocumentError::Task(e.to_string()))??;

        info!(
            user_id = %user.id,
            path = %path.display(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Manual generated"
        );
        Ok(path)
    }
}

fn render_manual(
    template: &Path,
    output: &Path,
    name: &str,
    title: &str,
) -> Result<PathBuf, DocumentError> {
    if !template.is_file() {
        return Err(DocumentError::TemplateMissing(template.to_path_buf()));
    }

    let mut doc = Document::load(template)?;

    // Keep only the first page of the template
    let pages = doc.get_pages();
    let first = *pages.keys().next().ok_or(DocumentError::EmptyTemplate)?;
    let rest: Vec<u32> = pages.keys().copied().filter(|n| *n != first).collect();
    if !rest.is_empty() {
        doc.delete_pages(&rest);
    }
    let page_id = *doc
        .get_pages()
        .values()
        .next()
        .ok_or(DocumentError::EmptyTemplate)?;

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    inherit_resources(&mut doc, page_id)?;
    register_font(&mut doc, page_id, font_id)?;

    let overlay: Content<Vec<Operation>> = Content {
        operations: [text_at(NAME_POSITION, name), text_at(TITLE_POSITION, title)]
            .into_iter()
            .flatten()
            .collect(),
    };
    doc.add_page_contents(page_id, overlay.encode()?)?;

    doc.prune_objects();
    doc.compress();

    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let partial = output.with_extension("pdf.part");
    if let Err(e) = save_and_rename(&mut doc, &partial, output) {
        let _ = std::fs::remove_file(&partial);
        return Err(e);
    }

    Ok(output.to_path_buf())
}

fn save_and_rename(doc: &mut Document, partial: &Path, output: &Path) -> Result<(), DocumentError> {
    doc.save(partial)?;
    std::fs::rename(partial, output)?;
    Ok(())
}

fn text_at((x, y): (i64, i64), text: &str) -> Vec<Operation> {
    vec![
        Operation::new("BT", vec![]),
        Operation::new(
            "Tf",
            vec![Object::Name(FONT_RESOURCE.as_bytes().to_vec()), Object::Integer(FONT_SIZE)],
        ),
        Operation::new("Td", vec![Object::Integer(x), Object::Integer(y)]),
        Operation::new("Tj", vec![Object::string_literal(text)]),
        Operation::new("ET", vec![]),
    ]
}

/// Resources may be inherited from an ancestor `Pages` node. Copy them onto
/// the page so adding the overlay font does not hide them.
fn inherit_resources(doc: &mut Document, page_id: ObjectId) -> Result<(), DocumentError> {
    const MAX_DEPTH: usize = 32;

    let page = doc.get_dictionary(page_id)?;
    if page.has(b"Resources") {
        return Ok(());
    }

    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
    let mut inherited = None;
    for _ in 0..MAX_DEPTH {
        let Some(node_id) = parent else { break };
        let node = doc.get_dictionary(node_id)?;
        match node.get(b"Resources") {
            Ok(Object::Dictionary(resources)) => {
                inherited = Some(resources.clone());
                break;
            }
            Ok(Object::Reference(id)) => {
                inherited = Some(doc.get_dictionary(*id)?.clone());
                break;
            }
            _ => parent = node.get(b"Parent").and_then(Object::as_reference).ok(),
        }
    }

    if let Some(resources) = inherited {
        debug!("Copying inherited resources onto the manual page");
        doc.get_dictionary_mut(page_id)?
            .set("Resources", Object::Dictionary(resources));
    }
    Ok(())
}

enum FontEntry {
    Inline,
    Shared(ObjectId),
    Missing,
}

/// Make the overlay font available on the page. The font dictionary may be
/// inline in the page resources or an indirect object shared between pages.
fn register_font(doc: &mut Document, page_id: ObjectId, font_id: ObjectId) -> Result<(), DocumentError> {
    let resources = doc.get_or_create_resources(page_id)?.as_dict_mut()?;
    let entry = match resources.get(b"Font") {
        Ok(Object::Dictionary(_)) => FontEntry::Inline,
        Ok(Object::Reference(id)) => FontEntry::Shared(*id),
        _ => FontEntry::Missing,
    };

    match entry {
        FontEntry::Inline => {
            resources
                .get_mut(b"Font")?
                .as_dict_mut()?
                .set(FONT_RESOURCE, font_id);
        }
        FontEntry::Missing => resources.set("Font", dictionary! { FONT_RESOURCE => font_id }),
        FontEntry::Shared(fonts_id) => {
            doc.get_object_mut(fonts_id)?
                .as_dict_mut()?
                .set(FONT_RESOURCE, font_id);
        }
    }
    Ok(())
}
