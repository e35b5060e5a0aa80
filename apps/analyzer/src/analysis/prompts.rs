// Prompt contract for resume feedback. The model's answer is stored verbatim
// as the record's feedback document, so the shape below is what the UI reads.

/// JSON shape the model must answer with.
pub const FEEDBACK_RESPONSE_FORMAT: &str = r#"interface Feedback {
  overallScore: number; // max 100
  ATS: {
    score: number; // rate based on ATS suitability
    tips: {
      type: "good" | "improve";
      tip: string; // give 3-4 tips
    }[];
  };
  toneAndStyle: {
    score: number; // max 100
    tips: {
      type: "good" | "improve";
      tip: string; // make it a short "title" for the actual explanation
      explanation: string; // explain in detail here
    }[]; // give 3-4 tips
  };
  content: {
    score: number; // max 100
    tips: {
      type: "good" | "improve";
      tip: string;
      explanation: string;
    }[];
  };
  structure: {
    score: number; // max 100
    tips: {
      type: "good" | "improve";
      tip: string;
      explanation: string;
    }[];
  };
  skills: {
    score: number; // max 100
    tips: {
      type: "good" | "improve";
      tip: string;
      explanation: string;
    }[];
  };
}"#;

/// Replace: {job_title}, {job_description}, {response_format}
pub const FEEDBACK_PROMPT_TEMPLATE: &str = r#"You are an expert in ATS (Applicant Tracking System) and resume analysis.
Analyze and rate the attached resume, and suggest how to improve it.
The rating can be low if the resume is bad. Be thorough and detailed; do not hesitate to point out mistakes or areas for improvement.
If there is a lot to improve, do not hesitate to give low scores. This is to help the user improve their resume.
If available, use the job description of the job the user is applying to in order to give more targeted feedback.

The job title is: {job_title}
The job description is: {job_description}

Provide the feedback using the following format:
{response_format}

Return the analysis as a JSON object, without any other text and without backticks.
Do NOT include any comments in the JSON."#;

/// Fills the template in one pass; substituted text is never rescanned, so
/// braces in user input come through verbatim.
pub fn prepare_instructions(job_title: &str, job_description: &str) -> String {
    let fills = [
        ("{job_title}", job_title),
        ("{job_description}", job_description),
        ("{response_format}", FEEDBACK_RESPONSE_FORMAT),
    ];
    let mut prompt = String::with_capacity(
        FEEDBACK_PROMPT_TEMPLATE.len() + FEEDBACK_RESPONSE_FORMAT.len() + job_description.len(),
    );
    let mut rest = FEEDBACK_PROMPT_TEMPLATE;
    while let Some(at) = rest.find('{') {
        prompt.push_str(&rest[..at]);
        let tail = &rest[at..];
        match fills.iter().find(|(placeholder, _)| tail.starts_with(placeholder)) {
            Some((placeholder, value)) => {
                prompt.push_str(value);
                rest = &tail[placeholder.len()..];
            }
            None => {
                prompt.push('{');
                rest = &tail[1..];
            }
        }
    }
    prompt.push_str(rest);
    prompt
}
