use crate::error::PipelineError;
use regex::{Captures, Regex};
use std::sync::OnceLock;

fn placeholder_re() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| {
        Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder pattern is valid")
    })
}

/// Prompt text with `{name}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }

    /// Placeholder names in first-seen order, without duplicates.
    pub fn variables(&self) -> Vec<String> {
        let mut names = Vec::new();
        for capture in placeholder_re().captures_iter(&self.template) {
            let name = capture[1].to_string();
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    pub fn render(&self, values: &[(&str, &str)]) -> Result<String, PipelineError> {
        if let Some(missing) = self
            .variables()
            .into_iter()
            .find(|name| !values.iter().any(|(key, _)| key == name))
        {
            return Err(PipelineError::MissingVariable(missing));
        }

        let rendered = placeholder_re().replace_all(&self.template, |capture: &Captures| {
            let name = &capture[1];
            values
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value).to_string())
                .unwrap_or_default()
        });
        Ok(rendered.into_owned())
    }
}

pub const QUESTION_ANSWERING: &str = r#"Answer the question as detailed as possible from the provided context, make sure to provide all the details. If the answer is not in the provided context just say, "answer is not available in the context", don't provide the wrong answer.

Context:
{context}

Question:
{question}

Answer:
"#;

pub const BID_SUMMARY: &str = r#"You are an expert bid analyzer. Please analyze this bid document text and provide a structured analysis:

{document}

Provide your analysis in the following format:

REQUIRED QUALIFICATIONS:
- List each qualification requirement
- If none found, state "No specific qualifications mentioned"

REQUIRED CERTIFICATIONS:
- List each certification requirement
- If none found, state "No specific certifications mentioned"

REQUIRED EXPERIENCE:
- List each experience requirement
- If none found, state "No specific experience requirements mentioned"

MISSING OR UNCLEAR REQUIREMENTS:
- List any vague or missing requirements
- If none found, state "No missing or unclear requirements identified"

ELIGIBILITY FLAGS:
- List any critical requirements that could disqualify a bid
- If none found, state "No eligibility issues identified"
"#;

pub const SUBMISSION_CHECKLIST: &str = r#"You are an expert RFP analyst. Please analyze this document and provide a structured checklist of submission requirements:

{document}

Provide your analysis in the following format:

DOCUMENT FORMAT REQUIREMENTS:
A concise paragraph describing any formatting requirements found in the document, including page limits, font specifications, spacing, margins, or other formatting guidelines. If no specific format requirements are mentioned, state "No specific format requirements mentioned in the document."

REQUIRED ATTACHMENTS:
- List each required form/attachment
- Specify form numbers if provided
- Specify if original signatures are required
- If none found, state "No specific attachments mentioned"

SUBMISSION FORMAT:
- Number of copies required
- Electronic/Physical submission
- File format for electronic submission
- If none specified, state "No specific format requirements mentioned"

ADDITIONAL REQUIREMENTS:
- Any other formatting or submission requirements
- If none found, state "No additional requirements identified"

Please be specific and precise in listing each requirement."#;

pub const CONTRACT_RISKS: &str = r#"You are an expert contract analyzer. Please analyze this contract document and identify potential risks and biased clauses:

{document}

Provide your analysis in the following format:

BIASED CLAUSES:
- List each identified biased clause
- Explain why it's disadvantageous
- If none found, state "No biased clauses identified"

TERMINATION RIGHTS:
- List any unilateral termination rights
- Analyze notice periods
- If none found, state "No concerning termination rights found"

LIABILITY AND INDEMNIFICATION:
- List any one-sided liability clauses
- Identify unfair indemnification requirements
- If balanced, state "Liability terms appear balanced"

SUGGESTED MODIFICATIONS:
- For each issue, provide specific modification suggestions
- Include recommended notice periods or balanced terms
- If no changes needed, state "No modifications suggested"

ADDITIONAL RISKS:
- List any other contract risks not covered above
- If none found, state "No additional risks identified"
"#;

pub const RFP_ELIGIBILITY: &str = r#"You are a compliance analyst assessing eligibility for RFP participation.

Analyze the company profile against the eligibility criteria listed in the RFP. Consider certifications, legal registrations, years of experience, and any mandatory qualifications.

### RFP ELIGIBILITY CRITERIA:
{rfp_chunk}

### COMPANY PROFILE:
{company_chunk}

Return only one of the following:
- Eligible: [Clearly explain why]
- Not Eligible: [Clearly explain what's missing or non-compliant]
"#;

pub const RFP_GAP_ANALYSIS: &str = r#"You are a gap analysis expert. Identify all mandatory qualifications, certifications, licenses, registrations and other must-have conditions from the RFP and compare them with the company profile.
{guidelines}
### RFP REQUIREMENTS:
{rfp_chunk}

### COMPANY PROFILE:
{company_chunk}

Return in the following format:
- Met Requirements:
  - [Requirement, with supporting RFP and profile text]
- Unmet Requirements:
  - [Requirement]: [Why it is missing or insufficient]
  - Suggestion: [How to address or mitigate the gap]
"#;

pub const RFP_SUBMISSION_CHECKLIST: &str = r#"You are a proposal checklist generator.

From the RFP text below, extract all submission instructions. Create a checklist that includes:
- Document formatting (font size, spacing, margins, file types)
- Required attachments or forms
- Submission deadlines
- Submission method (email, portal, physical)

### RFP SUBMISSION DETAILS:
{rfp_chunk}

Return as a bullet-point checklist grouped by category.
"#;

pub const RFP_RISKS: &str = r#"You are a legal risk analyzer. Review the following RFP text for clauses that may introduce legal, financial, or operational risk to a vendor.

For each risky or biased clause, provide:
- Clause (quote it)
- Risk Level (Low / Medium / High)
- Suggestion (how to rephrase, negotiate, or respond)

### RFP CLAUSES:
{rfp_chunk}

Only return findings that clearly carry potential risk.
"#;

pub const GRAPH_QUESTION_ANSWERING: &str = r#"Based on the following context, please answer the question.
Context: {context}
Question: {question}
Answer:"#;

pub const GRAPH_EXTRACTION: &str = r#"You are a knowledge graph builder. Extract the entities and the relationships between them from the text below.

Rules:
- Use the most complete name of an entity as its id, and reuse that id for every mention.
- Use short PascalCase types for entities, such as Person, Organization, Location, Document, Requirement, Date.
- Use UPPER_SNAKE_CASE for relationship types, such as WORKS_FOR, LOCATED_IN, REQUIRES.
- Only connect entities that are listed in "nodes".

Reply with JSON only, in exactly this shape:
{"nodes": [{"id": "...", "type": "..."}], "relationships": [{"source": "...", "target": "...", "type": "..."}]}

Text:
{text}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_fills_every_placeholder() {
        let template = PromptTemplate::new("Context: {context}\nQuestion: {question}\n{context}");
        let rendered = template
            .render(&[("question", "Who signs?"), ("context", "The CFO signs.")])
            .unwrap();
        assert_eq!(
            rendered,
            "Context: The CFO signs.\nQuestion: Who signs?\nThe CFO signs."
        );
    }

    #[test]
    fn missing_value_is_an_error() {
        let template = PromptTemplate::new(RFP_ELIGIBILITY);
        let result = template.render(&[("rfp_chunk", "criteria")]);
        assert!(matches!(
            result,
            Err(PipelineError::MissingVariable(name)) if name == "company_chunk"
        ));
    }

    #[test]
    fn extra_values_are_ignored() {
        let template = PromptTemplate::new(RFP_RISKS);
        let rendered = template
            .render(&[("rfp_chunk", "Vendor bears all liability."), ("unused", "x")])
            .unwrap();
        assert!(rendered.contains("Vendor bears all liability."));
    }

    #[test]
    fn json_braces_are_not_placeholders() {
        let template = PromptTemplate::new(GRAPH_EXTRACTION);
        assert_eq!(template.variables(), vec!["text".to_string()]);
        let rendered = template.render(&[("text", "Acme hired Bob.")]).unwrap();
        assert!(rendered.contains(r#"{"nodes": [{"id": "...", "type": "..."}]"#));
    }

    #[test]
    fn builtin_templates_declare_expected_variables() {
        assert_eq!(
            PromptTemplate::new(QUESTION_ANSWERING).variables(),
            vec!["context", "question"]
        );
        for document_template in [BID_SUMMARY, SUBMISSION_CHECKLIST, CONTRACT_RISKS] {
            assert_eq!(
                PromptTemplate::new(document_template).variables(),
                vec!["document"]
            );
        }
        assert_eq!(
            PromptTemplate::new(RFP_GAP_ANALYSIS).variables(),
            vec!["guidelines", "rfp_chunk", "company_chunk"]
        );
    }
}
