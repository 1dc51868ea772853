use std::collections::HashSet;
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use uuid::Uuid;

use crate::slip::{ModuleRef, Slip};

#[derive(Debug, Deserialize)]
struct CsvRow {
    module: String,
    assessment: Option<String>,
    weight: Option<String>,
    score: Option<String>,
    target: Option<String>,
}

#[derive(Debug, Default, PartialEq)]
pub struct ImportSummary {
    pub modules_created: usize,
    pub assessments_added: usize,
}

pub fn import_csv(slip: &mut Slip, csv_path: &Path) -> anyhow::Result<ImportSummary> {
    let reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    import_reader(slip, reader)
}

fn import_reader<R: std::io::Read>(
    slip: &mut Slip,
    mut reader: csv::Reader<R>,
) -> anyhow::Result<ImportSummary> {
    let mut summary = ImportSummary::default();
    let mut created: HashSet<Uuid> = HashSet::new();

    for (line, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result.with_context(|| format!("invalid CSV row {}", line + 1))?;
        let name = row.module.trim();
        if name.is_empty() {
            anyhow::bail!("CSV row {} has no module name", line + 1);
        }

        let module_ref = ModuleRef::Name(name.to_string());
        let module = match slip.positions_named(name).len() {
            0 => {
                let module = slip.add_module();
                module.rename(name);
                // Imported rows replace the placeholder test.
                module.assessments.clear();
                created.insert(module.id);
                summary.modules_created += 1;
                module
            }
            1 => slip.module_mut(&module_ref)?,
            count => anyhow::bail!(
                "CSV row {} names {}, but {count} modules share that name",
                line + 1,
                module_ref
            ),
        };

        if let Some(target) = row.target.as_deref().filter(|t| !t.trim().is_empty()) {
            module.set_target(target);
        }

        let has_assessment = [&row.assessment, &row.weight, &row.score]
            .iter()
            .any(|field| field.as_deref().is_some_and(|v| !v.trim().is_empty()));
        if has_assessment {
            module.add_assessment(
                row.assessment.as_deref(),
                row.weight.as_deref(),
                row.score.as_deref(),
            );
            summary.assessments_added += 1;
        }
    }

    // A target-only row still leaves a created module with its placeholder.
    for module_id in created {
        let module = slip.module_mut(&ModuleRef::Id(module_id))?;
        if module.assessments.is_empty() {
            module.add_assessment(None, None, None);
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Module;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn reader(text: &str) -> csv::Reader<&[u8]> {
        csv::Reader::from_reader(text.as_bytes())
    }

    #[test]
    fn groups_rows_by_module_name() {
        let mut slip = Slip::default();
        let summary = import_reader(
            &mut slip,
            reader(
                "module,assessment,weight,score,target\n\
                 Mathematics,Midterm,40,72,70\n\
                 Mathematics,Final,60,,\n\
                 Physics,Lab,25,88,\n",
            ),
        )
        .unwrap();

        assert_eq!(
            summary,
            ImportSummary {
                modules_created: 2,
                assessments_added: 3
            }
        );
        let maths = &slip.modules()[0];
        assert_eq!(maths.name, "Mathematics");
        assert_eq!(maths.target, Some(70.0));
        assert_eq!(maths.assessments.len(), 2);
        assert_eq!(maths.assessments[1].name, "Final");
        assert_eq!(maths.assessments[1].score, None);
        assert_eq!(slip.modules()[1].target, None);
    }

    #[test]
    fn appends_to_existing_modules() {
        let mut existing = Module::new();
        existing.rename("Physics");
        let mut slip = Slip::new(vec![existing]);

        let summary = import_reader(
            &mut slip,
            reader("module,assessment,weight,score,target\nphysics,Quiz,10,90,\n"),
        )
        .unwrap();

        assert_eq!(summary.modules_created, 0);
        assert_eq!(slip.len(), 1);
        let physics = &slip.modules()[0];
        assert_eq!(physics.assessments.len(), 2);
        assert_eq!(physics.assessments[1].name, "Quiz");
    }

    #[test]
    fn shared_module_names_are_rejected_not_duplicated() {
        let mut first = Module::new();
        first.rename("Biology");
        let mut second = Module::new();
        second.rename("Biology");
        let mut slip = Slip::new(vec![first, second]);

        let result = import_reader(
            &mut slip,
            reader(
                "module,assessment,weight,score,target\n\
                 Biology,Lab,20,70,\n\
                 Biology,Exam,80,65,\n",
            ),
        );

        let err = result.unwrap_err();
        assert!(err.to_string().contains("2 modules share that name"));
        assert_eq!(slip.len(), 2);
    }

    #[test]
    fn target_only_rows_keep_a_placeholder_test() {
        let mut slip = Slip::default();
        import_reader(
            &mut slip,
            reader("module,assessment,weight,score,target\nArt,,,,60\n"),
        )
        .unwrap();

        let art = &slip.modules()[0];
        assert_eq!(art.target, Some(60.0));
        assert_eq!(art.assessments.len(), 1);
        assert_eq!(art.assessments[0].name, "Test 1");
    }

    #[test]
    fn rejects_rows_without_module() {
        let mut slip = Slip::default();
        let result = import_reader(
            &mut slip,
            reader("module,assessment,weight,score,target\n ,Quiz,10,90,\n"),
        );
        assert!(result.is_err());
    }

    #[test]
    fn imports_from_a_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "module,assessment,weight,score,target").unwrap();
        writeln!(file, "Economics,Essay,50,77,75").unwrap();

        let mut slip = Slip::default();
        let summary = import_csv(&mut slip, file.path()).unwrap();
        assert_eq!(summary.assessments_added, 1);
        assert_eq!(slip.modules()[0].assessments[0].score, Some(77.0));
    }
}
