//! Band descriptor text injected verbatim into examiner prompts.

use std::path::Path;

use anyhow::Context;

use crate::config::RubricOverrides;
use crate::model::TaskNumber;

pub const BUILTIN_VERSION: &str = "writing-descriptors-v2";

const TASK1_DESCRIPTORS: &str = "\
TASK ACHIEVEMENT (Task 1)
Band 9: Fully satisfies all requirements; clearly presents a fully developed response.
Band 8: Covers all requirements sufficiently; clearly presents and highlights key features, well illustrated and extended.
Band 7: Covers the requirements; presents a clear overview of main trends, differences or stages; clearly presents and highlights key features but could be more fully extended.
Band 6: Addresses the requirements with some irrelevant, inappropriate or inaccurate detail; presents an overview with information appropriately selected; key features adequately highlighted but details may be irrelevant or inaccurate.
Band 5: Generally addresses the task; recounts detail mechanically with no clear overview; inadequately covers key features; may focus on details; may contain inaccurate data.
Band 4: Attempts the task but does not cover all key features; may confuse key features with detail; parts may be unclear, irrelevant or inaccurate.

COHERENCE AND COHESION
Band 9: Uses cohesion in such a way that it attracts no attention; skilfully manages paragraphing.
Band 8: Sequences information and ideas logically; manages all aspects of cohesion well; uses paragraphing sufficiently and appropriately.
Band 7: Logically organises information and ideas with clear progression throughout; uses a range of cohesive devices appropriately although there may be some under- or over-use.
Band 6: Arranges information coherently with clear overall progression; uses cohesive devices effectively but cohesion within or between sentences may be faulty or mechanical; may not always use referencing clearly.
Band 5: Presents information with some organisation but may lack overall progression; inadequate, inaccurate or over-used cohesive devices; repetitive because of lack of referencing.
Band 4: Presents information and ideas but not arranged coherently; some basic cohesive devices which may be inaccurate or repetitive.

LEXICAL RESOURCE
Band 9: Wide range of vocabulary with very natural and sophisticated control; rare minor errors only as slips.
Band 8: Wide range fluently and flexibly used to convey precise meanings; skilful use of uncommon items with occasional inaccuracies in word choice and collocation; rare errors in spelling or word formation.
Band 7: Sufficient range to allow some flexibility and precision; uses less common items with some awareness of style and collocation; occasional errors in word choice, spelling or word formation.
Band 6: Adequate range for the task; attempts less common vocabulary with some inaccuracy; errors in spelling or word formation that do not impede communication.
Band 5: Limited range, minimally adequate for the task; noticeable errors in spelling or word formation that may cause some difficulty for the reader.
Band 4: Only basic vocabulary used repetitively or inappropriately; limited control of word formation and spelling that may strain the reader.

GRAMMATICAL RANGE AND ACCURACY
Band 9: Wide range of structures with full flexibility and accuracy; rare minor errors only as slips.
Band 8: Wide range of structures; the majority of sentences are error-free; only very occasional errors or inappropriacies.
Band 7: Variety of complex structures; frequent error-free sentences; good control of grammar and punctuation with a few errors.
Band 6: Mix of simple and complex sentence forms; some errors in grammar and punctuation that rarely reduce communication.
Band 5: Limited range of structures; attempts complex sentences that tend to be less accurate than simple ones; frequent grammatical errors; punctuation may be faulty.
Band 4: Very limited range; rare subordinate clauses; some accurate structures but errors predominate; punctuation often faulty.
";

const TASK2_DESCRIPTORS: &str = "\
TASK RESPONSE (Task 2)
Band 9: Fully addresses all parts of the task; presents a fully developed position with relevant, fully extended and well supported ideas.
Band 8: Sufficiently addresses all parts of the task; presents a well-developed response with relevant, extended and supported ideas.
Band 7: Addresses all parts of the task; presents a clear position throughout; extends and supports main ideas but may over-generalise or lack focus in supporting ideas.
Band 6: Addresses all parts of the task although some parts more fully than others; presents a relevant position although conclusions may be unclear or repetitive; main ideas relevant but some insufficiently developed.
Band 5: Addresses the task only partially; format may be inappropriate in places; expresses a position but development is not always clear; limited main ideas, insufficiently developed, possibly irrelevant detail.
Band 4: Responds to the task only minimally or tangentially; position unclear; main ideas difficult to identify, repetitive, irrelevant or not well supported.

COHERENCE AND COHESION
Band 9: Uses cohesion in such a way that it attracts no attention; skilfully manages paragraphing.
Band 8: Sequences information and ideas logically; manages all aspects of cohesion well; uses paragraphing sufficiently and appropriately.
Band 7: Logically organises information and ideas with clear progression throughout; range of cohesive devices used appropriately with some under- or over-use; a clear central topic within each paragraph.
Band 6: Arranges information coherently with clear overall progression; cohesive devices effective but may be faulty or mechanical; paragraphing not always logical.
Band 5: Some organisation but lacking overall progression; inadequate, inaccurate or over-used cohesive devices; paragraphing may be inadequate.
Band 4: Information and ideas not arranged coherently; no clear progression; basic cohesive devices inaccurate or repetitive; may not write in paragraphs.

LEXICAL RESOURCE
Band 9: Wide range of vocabulary with very natural and sophisticated control; rare minor errors only as slips.
Band 8: Wide range fluently and flexibly used to convey precise meanings; skilful use of uncommon items with occasional inaccuracies; rare errors in spelling or word formation.
Band 7: Sufficient range to allow some flexibility and precision; less common items used with awareness of style and collocation; occasional errors in word choice, spelling or word formation.
Band 6: Adequate range for the task; attempts less common vocabulary with some inaccuracy; errors in spelling or word formation that do not impede communication.
Band 5: Limited range, minimally adequate for the task; noticeable errors in spelling or word formation that may cause difficulty for the reader.
Band 4: Only basic vocabulary used repetitively or inappropriately; limited control of word formation and spelling that may strain the reader.

GRAMMATICAL RANGE AND ACCURACY
Band 9: Wide range of structures with full flexibility and accuracy; rare minor errors only as slips.
Band 8: Wide range of structures; the majority of sentences are error-free; only very occasional errors or inappropriacies.
Band 7: Variety of complex structures; frequent error-free sentences; good control of grammar and punctuation with a few errors.
Band 6: Mix of simple and complex sentence forms; some errors in grammar and punctuation that rarely reduce communication.
Band 5: Limited range of structures; complex sentences less accurate than simple ones; frequent grammatical errors; faulty punctuation.
Band 4: Very limited range; rare subordinate clauses; errors predominate; punctuation often faulty.
";

/// Versioned descriptor text per task. Read-only once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Rubric {
    version: String,
    task1: String,
    task2: String,
}

impl Default for Rubric {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Rubric {
    pub fn builtin() -> Self {
        Self {
            version: BUILTIN_VERSION.to_string(),
            task1: TASK1_DESCRIPTORS.to_string(),
            task2: TASK2_DESCRIPTORS.to_string(),
        }
    }

    pub fn new(version: impl Into<String>, task1: impl Into<String>, task2: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            task1: task1.into(),
            task2: task2.into(),
        }
    }

    /// Built-in text with any configured files swapped in.
    pub fn with_overrides(overrides: &RubricOverrides) -> anyhow::Result<Self> {
        let mut rubric = Self::builtin();
        let mut custom = false;
        if let Some(path) = &overrides.task1_path {
            rubric.task1 = read_descriptor(path)?;
            custom = true;
        }
        if let Some(path) = &overrides.task2_path {
            rubric.task2 = read_descriptor(path)?;
            custom = true;
        }
        if custom {
            rubric.version = format!("{}+custom", BUILTIN_VERSION);
        }
        Ok(rubric)
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn text(&self, task: TaskNumber) -> &str {
        match task {
            TaskNumber::One => &self.task1,
            TaskNumber::Two => &self.task2,
        }
    }
}

fn read_descriptor(path: &Path) -> anyhow::Result<String> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read rubric {}", path.display()))?;
    if text.trim().is_empty() {
        anyhow::bail!("config error: rubric file {} is empty", path.display());
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_text_names_the_task_specific_criterion() {
        let r = Rubric::builtin();
        assert!(r.text(TaskNumber::One).contains("TASK ACHIEVEMENT"));
        assert!(!r.text(TaskNumber::One).contains("TASK RESPONSE"));
        assert!(r.text(TaskNumber::Two).contains("TASK RESPONSE"));
        assert_eq!(r.version(), BUILTIN_VERSION);
    }

    #[test]
    fn overrides_replace_one_task() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t2.txt");
        std::fs::write(&path, "CUSTOM TASK 2 DESCRIPTORS").unwrap();
        let r = Rubric::with_overrides(&RubricOverrides {
            task1_path: None,
            task2_path: Some(path),
        })
        .unwrap();
        assert_eq!(r.text(TaskNumber::Two), "CUSTOM TASK 2 DESCRIPTORS");
        assert!(r.text(TaskNumber::One).contains("TASK ACHIEVEMENT"));
        assert!(r.version().ends_with("+custom"));
    }

    #[test]
    fn empty_override_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t1.txt");
        std::fs::write(&path, "  \n").unwrap();
        let err = Rubric::with_overrides(&RubricOverrides {
            task1_path: Some(path),
            task2_path: None,
        })
        .unwrap_err();
        assert!(err.to_string().contains("empty"));
    }
}
