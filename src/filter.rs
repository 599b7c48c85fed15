//! Topic filters applied to a provider's batch after normalization.
//!
//! arXiv results are restricted to computer-science and statistics subjects.
//! The generic aggregators return plenty of off-topic hits for verification
//! queries, so their results are kept only when they mention a hardware
//! verification term somewhere in the title, abstract or venue.

use crate::models::Paper;

/// Subject prefixes kept from arXiv results.
pub const ARXIV_SUBJECTS: [&str; 2] = ["cs", "stat"];

/// Query tokens that switch on the verification filter.
pub const VERIFICATION_QUERY_TOKENS: [&str; 3] = ["verification", "uvm", "dvcon"];

/// Terms a paper must mention to survive the verification filter.
pub const VERIFICATION_MARKERS: [&str; 13] = [
    "verification",
    "uvm",
    "systemverilog",
    "rtl",
    "testbench",
    "formal",
    "assertion",
    "coverage",
    "dvcon",
    "soc",
    "fpga",
    "asic",
    "hdl",
];

/// Post-filter strategy of a source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TopicFilter {
    /// Keep everything
    #[default]
    None,
    /// Keep papers with at least one tag in [`ARXIV_SUBJECTS`]
    SubjectPrefix,
    /// Keep verification papers when the keyword is verification-flavoured
    Verification,
}

impl TopicFilter {
    /// Apply the filter to a batch fetched for `keyword`.
    pub fn apply(&self, papers: Vec<Paper>, keyword: &str) -> Vec<Paper> {
        match self {
            TopicFilter::None => papers,
            TopicFilter::SubjectPrefix => filter_by_subject(papers, &ARXIV_SUBJECTS),
            TopicFilter::Verification if is_verification_query(keyword) => {
                let before = papers.len();
                let kept: Vec<Paper> = papers.into_iter().filter(is_verification_paper).collect();
                tracing::info!(
                    "Verification filter kept {} of {} papers for '{}'",
                    kept.len(),
                    before,
                    keyword
                );
                kept
            }
            TopicFilter::Verification => papers,
        }
    }
}

/// Keep papers whose first dotted component of any tag is in `subjects`.
pub fn filter_by_subject(papers: Vec<Paper>, subjects: &[&str]) -> Vec<Paper> {
    let before = papers.len();
    let kept: Vec<Paper> = papers
        .into_iter()
        .filter(|paper| {
            paper.tags.iter().any(|tag| {
                let prefix = tag.split('.').next().unwrap_or_default();
                subjects.contains(&prefix)
            })
        })
        .collect();
    tracing::info!(
        "Subject filter {:?} kept {} of {} papers",
        subjects,
        kept.len(),
        before
    );
    kept
}

/// Whether the keyword looks like a digital-verification query.
pub fn is_verification_query(keyword: &str) -> bool {
    let lowered = keyword.to_lowercase();
    VERIFICATION_QUERY_TOKENS
        .iter()
        .any(|token| lowered.contains(token))
}

/// Whether the title, abstract or comment mention a verification marker.
pub fn is_verification_paper(paper: &Paper) -> bool {
    let haystack = format!("{} {} {}", paper.title, paper.r#abstract, paper.comment).to_lowercase();
    if haystack.trim().is_empty() {
        return false;
    }
    VERIFICATION_MARKERS
        .iter()
        .any(|marker| haystack.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PaperBuilder;

    fn paper(title: &str, abstract_text: &str, comment: &str) -> Paper {
        PaperBuilder::new(title, "https://example.com")
            .abstract_text(abstract_text)
            .comment(comment)
            .build()
    }

    fn tagged(title: &str, tags: &[&str]) -> Paper {
        PaperBuilder::new(title, "https://arxiv.org/abs/1")
            .tags(tags.iter().copied())
            .build()
    }

    #[test]
    fn test_subject_prefix() {
        let papers = vec![
            tagged("a", &["cs.AR"]),
            tagged("b", &["eess.SY", "stat.ML"]),
            tagged("c", &["physics.ins-det"]),
            tagged("d", &[]),
            tagged("e", &["csx.XX"]),
        ];

        let kept = filter_by_subject(papers, &ARXIV_SUBJECTS);
        let titles: Vec<&str> = kept.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["a", "b"]);
    }

    #[test]
    fn test_verification_query_detection() {
        assert!(is_verification_query("digital verification"));
        assert!(is_verification_query("UVM"));
        assert!(is_verification_query("DVCon papers"));
        assert!(!is_verification_query("large language models"));
    }

    #[test]
    fn test_verification_paper_markers() {
        assert!(is_verification_paper(&paper("An RTL bug hunt", "", "")));
        assert!(is_verification_paper(&paper("x", "", "Design and Verification Conference")));
        assert!(is_verification_paper(&paper("x", "Functional COVERAGE closure", "")));
        assert!(!is_verification_paper(&paper("Protein folding", "Deep nets", "Nature")));
    }

    #[test]
    fn test_verification_filter_only_for_flavoured_queries() {
        let papers = vec![
            paper("UVM register layer", "", ""),
            paper("Graph neural networks", "", ""),
        ];

        let generic = TopicFilter::Verification.apply(papers.clone(), "graph learning");
        assert_eq!(generic.len(), 2);

        let focused = TopicFilter::Verification.apply(papers, "verification");
        assert_eq!(focused.len(), 1);
        assert_eq!(focused[0].title, "UVM register layer");
    }

    #[test]
    fn test_filters_are_idempotent() {
        let papers = vec![
            paper("Formal property checking", "", ""),
            paper("Image segmentation", "", ""),
            paper("Assertion based verification", "", ""),
        ];

        let once = TopicFilter::Verification.apply(papers, "uvm");
        let twice = TopicFilter::Verification.apply(once.clone(), "uvm");
        assert_eq!(once, twice);

        let tagged_papers = vec![tagged("a", &["cs.LO"]), tagged("b", &["q-bio.NC"])];
        let once = TopicFilter::SubjectPrefix.apply(tagged_papers, "uvm");
        let twice = TopicFilter::SubjectPrefix.apply(once.clone(), "uvm");
        assert_eq!(once, twice);
    }
}
