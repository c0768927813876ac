//! Built-in rubrics for the five evaluable steps.

use crate::step::EvalStep;

use super::{Dimension, Rubric};

type DimensionSpec = (&'static str, &'static str, f64, [&'static str; 5]);

const QUALIFICATION: &[DimensionSpec] = &[
    (
        "Completeness",
        "Does the situation report capture all relevant aspects?",
        0.3,
        [
            "Missing multiple critical elements (summary, objectives, constraints, or questions)",
            "Missing one critical element or several important details",
            "All critical elements present but some details lacking",
            "Comprehensive with only minor omissions",
            "Fully comprehensive, all relevant aspects captured",
        ],
    ),
    (
        "Accuracy",
        "Is the situation report accurate given the client persona and initial facts?",
        0.25,
        [
            "Major inaccuracies or misinterpretations",
            "Several minor inaccuracies",
            "Mostly accurate with few minor errors",
            "Accurate with negligible errors",
            "Fully accurate, no misinterpretations",
        ],
    ),
    (
        "Relevance",
        "Are irrelevant details excluded?",
        0.2,
        [
            "Significant irrelevant content included",
            "Some irrelevant content",
            "Mostly relevant with minor tangents",
            "Highly relevant with minimal extraneous content",
            "Perfectly focused, no irrelevant content",
        ],
    ),
    (
        "Legal_Insight",
        "Are the legal questions well-formulated and insightful?",
        0.15,
        [
            "Legal questions are vague, poorly formulated, or missing",
            "Legal questions are superficial or miss key issues",
            "Legal questions are adequate but could be more precise",
            "Legal questions are well-formulated and insightful",
            "Legal questions are exceptionally precise and demonstrate deep legal insight",
        ],
    ),
    (
        "Clarity",
        "Is the situation report well-structured and clear?",
        0.1,
        [
            "Poorly structured, difficult to understand",
            "Some structural issues, somewhat unclear",
            "Adequately structured and clear",
            "Well-structured and clear",
            "Exceptionally well-structured and crystal clear",
        ],
    ),
];

const INITIAL_ANALYSIS: &[DimensionSpec] = &[
    (
        "Legal_Domain_Accuracy",
        "Is the legal domain correctly identified?",
        0.25,
        [
            "Incorrect legal domain",
            "Partially correct but imprecise",
            "Correct but could be more specific",
            "Accurate and appropriately specific",
            "Perfectly accurate and precise",
        ],
    ),
    (
        "Legal_Bases_Identification",
        "Are potential legal bases correctly identified?",
        0.3,
        [
            "Missing most relevant legal bases",
            "Missing several important legal bases",
            "Most relevant legal bases identified",
            "All important legal bases identified",
            "Comprehensive and precise identification of all relevant legal bases",
        ],
    ),
    (
        "Assessment_Quality",
        "Is the preliminary assessment sound and helpful?",
        0.25,
        [
            "Assessment is unsound or unhelpful",
            "Assessment has significant weaknesses",
            "Assessment is adequate",
            "Assessment is sound and helpful",
            "Assessment is exceptionally insightful and actionable",
        ],
    ),
    (
        "Investigation_Needs",
        "Are investigation needs correctly identified?",
        0.15,
        [
            "Investigation needs are poorly identified",
            "Missing important investigation needs",
            "Adequate identification of investigation needs",
            "Thorough identification of investigation needs",
            "Comprehensive and strategic identification of all investigation needs",
        ],
    ),
    (
        "Complexity_Assessment",
        "Is the complexity correctly assessed?",
        0.05,
        [
            "Complexity assessment is incorrect",
            "Complexity assessment is imprecise",
            "Complexity assessment is adequate",
            "Complexity assessment is accurate",
            "Complexity assessment is precise and well-justified",
        ],
    ),
];

const FACTUAL_RECORD: &[DimensionSpec] = &[
    (
        "Factual_Completeness",
        "Are all relevant facts included?",
        0.35,
        [
            "Missing many critical facts",
            "Missing several important facts",
            "Most facts included, some gaps",
            "Comprehensive with minor omissions",
            "Fully comprehensive, all relevant facts included",
        ],
    ),
    (
        "Factual_Accuracy",
        "Are facts accurately represented?",
        0.3,
        [
            "Multiple factual errors or misrepresentations",
            "Several factual inaccuracies",
            "Mostly accurate with minor errors",
            "Accurate with negligible errors",
            "Perfectly accurate, no errors",
        ],
    ),
    (
        "Chronological_Order",
        "Is the timeline properly organized chronologically?",
        0.15,
        [
            "Timeline is poorly organized or non-chronological",
            "Timeline has significant ordering issues",
            "Timeline is mostly chronological with minor issues",
            "Timeline is well-organized and chronological",
            "Timeline is perfectly chronological and clear",
        ],
    ),
    (
        "Evidence_Documentation",
        "Is evidence properly documented?",
        0.15,
        [
            "Evidence poorly documented or missing",
            "Evidence documentation has gaps",
            "Evidence adequately documented",
            "Evidence well-documented",
            "Evidence comprehensively and precisely documented",
        ],
    ),
    (
        "Neutrality",
        "Are facts presented neutrally without legal conclusions?",
        0.05,
        [
            "Significant legal conclusions mixed with facts",
            "Some legal conclusions in factual record",
            "Mostly neutral with minor interpretations",
            "Neutral with negligible interpretations",
            "Perfectly neutral, facts only",
        ],
    ),
];

const LEGAL_ARGUMENTS: &[DimensionSpec] = &[
    (
        "Legal_Soundness",
        "Are the legal arguments legally sound?",
        0.35,
        [
            "Arguments contain major legal errors",
            "Arguments have significant legal weaknesses",
            "Arguments are generally sound with minor issues",
            "Arguments are sound and well-reasoned",
            "Arguments are exceptionally sound and compelling",
        ],
    ),
    (
        "Factual_Support",
        "Are arguments well-supported by facts?",
        0.25,
        [
            "Arguments lack factual support",
            "Arguments have weak factual support",
            "Arguments have adequate factual support",
            "Arguments are well-supported by facts",
            "Arguments have comprehensive and precise factual support",
        ],
    ),
    (
        "Legal_Basis_Application",
        "Are legal bases correctly applied?",
        0.25,
        [
            "Legal bases misapplied or missing",
            "Legal bases partially or imprecisely applied",
            "Legal bases adequately applied",
            "Legal bases well-applied",
            "Legal bases expertly and precisely applied",
        ],
    ),
    (
        "Reasoning_Quality",
        "Is the reasoning connecting facts to conclusions clear and logical?",
        0.1,
        [
            "Reasoning is unclear or illogical",
            "Reasoning has significant gaps",
            "Reasoning is adequate",
            "Reasoning is clear and logical",
            "Reasoning is exceptionally clear, logical, and persuasive",
        ],
    ),
    (
        "Completeness",
        "Are all relevant arguments presented?",
        0.05,
        [
            "Missing most relevant arguments",
            "Missing several important arguments",
            "Most relevant arguments present",
            "All important arguments present",
            "Comprehensive presentation of all relevant arguments",
        ],
    ),
];

const RECOMMENDATIONS: &[DimensionSpec] = &[
    (
        "Actionability",
        "Are recommendations clear and actionable?",
        0.3,
        [
            "Recommendations are vague or not actionable",
            "Recommendations are somewhat vague",
            "Recommendations are adequately clear and actionable",
            "Recommendations are clear and actionable",
            "Recommendations are exceptionally clear, specific, and actionable",
        ],
    ),
    (
        "Legal_Soundness",
        "Are recommendations legally sound?",
        0.25,
        [
            "Recommendations contain major legal errors",
            "Recommendations have legal weaknesses",
            "Recommendations are generally sound",
            "Recommendations are legally sound",
            "Recommendations are exceptionally sound and well-justified",
        ],
    ),
    (
        "Risk_Assessment",
        "Are risks properly identified and assessed?",
        0.2,
        [
            "Risks poorly identified or assessed",
            "Risk assessment has significant gaps",
            "Risks adequately identified and assessed",
            "Risks well-identified and assessed",
            "Comprehensive and nuanced risk assessment",
        ],
    ),
    (
        "Alignment_with_Objectives",
        "Do recommendations align with client objectives?",
        0.15,
        [
            "Recommendations poorly aligned with client objectives",
            "Recommendations partially aligned with objectives",
            "Recommendations adequately aligned with objectives",
            "Recommendations well-aligned with objectives",
            "Recommendations perfectly aligned and optimized for client objectives",
        ],
    ),
    (
        "Alternatives_and_Next_Steps",
        "Are alternatives and next steps well-articulated?",
        0.1,
        [
            "Alternatives/next steps missing or unclear",
            "Alternatives/next steps incomplete",
            "Alternatives/next steps adequate",
            "Alternatives/next steps well-articulated",
            "Comprehensive alternatives with clear, strategic next steps",
        ],
    ),
];

/// The built-in rubric for a step.
pub fn builtin_rubric(step: EvalStep) -> Rubric {
    let specs = match step {
        EvalStep::Qualification => QUALIFICATION,
        EvalStep::InitialAnalysis => INITIAL_ANALYSIS,
        EvalStep::FactualRecord => FACTUAL_RECORD,
        EvalStep::LegalArguments => LEGAL_ARGUMENTS,
        EvalStep::Recommendations => RECOMMENDATIONS,
    };

    Rubric {
        step_name: step.as_str().to_string(),
        dimensions: specs
            .iter()
            .map(|(name, description, weight, criteria)| Dimension {
                name: name.to_string(),
                description: description.to_string(),
                weight: *weight,
                criteria: (1u8..)
                    .zip(criteria.iter())
                    .map(|(score, text)| (score, text.to_string()))
                    .collect(),
            })
            .collect(),
    }
}
