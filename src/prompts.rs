//! The feedback prompt sent with every resume.
//!
//! The model is asked to answer with a JSON object shaped like
//! [`crate::record::FeedbackReport`]; [`AI_RESPONSE_FORMAT`] describes that
//! shape in TypeScript-interface notation, which models follow reliably.

/// Shape of the JSON object the model must return.
pub const AI_RESPONSE_FORMAT: &str = r#"
      interface Feedback {
      overallScore: number; //max 100
      ATS: {
        score: number; //rate based on ATS suitability
        tips: {
          type: "good" | "improve";
          tip: string; //give 3-4 tips
        }[];
      };
      toneAndStyle: {
        score: number; //max 100
        tips: {
          type: "good" | "improve";
          tip: string; //make it a short "title" for the actual explanation
          explanation: string; //explain in detail here
        }[]; //give 3-4 tips
      };
      content: {
        score: number; //max 100
        tips: {
          type: "good" | "improve";
          tip: string; //make it a short "title" for the actual explanation
          explanation: string; //explain in detail here
        }[]; //give 3-4 tips
      };
      structure: {
        score: number; //max 100
        tips: {
          type: "good" | "improve";
          tip: string; //make it a short "title" for the actual explanation
          explanation: string; //explain in detail here
        }[]; //give 3-4 tips
      };
      skills: {
        score: number; //max 100
        tips: {
          type: "good" | "improve";
          tip: string; //make it a short "title" for the actual explanation
          explanation: string; //explain in detail here
        }[]; //give 3-4 tips
      };
    }"#;

/// Instructions for rating a resume against a job.
///
/// Empty job fields are interpolated as empty strings; the model is told to
/// use the description only when present.
pub fn prepare_instructions(job_title: &str, job_description: &str) -> String {
    format!(
        "You are an expert in ATS (Applicant Tracking System) and resume analysis.
      Please analyze and rate this resume and suggest how to improve it.
      The rating can be low if the resume is bad.
      Be thorough and detailed. Don't be afraid to point out any mistakes or areas for improvement.
      If there is a lot to improve, don't hesitate to give low scores. This is to help the user to improve their resume.
      If available, use the job description for the job user is applying to to give more detailed feedback.
      If provided, take the job description into consideration.
      The job title is: {job_title}
      The job description is: {job_description}
      Provide the feedback using the following format:
      {AI_RESPONSE_FORMAT}
      Return the analysis as an JSON object, without any other text and without the backticks.
      Do not include any other text or comments."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instructions_interpolate_job_fields() {
        let s = prepare_instructions("Backend Engineer", "Rust, Tokio");
        assert!(s.contains("The job title is: Backend Engineer"));
        assert!(s.contains("The job description is: Rust, Tokio"));
        assert!(s.contains("interface Feedback"));
        assert!(s.ends_with("Do not include any other text or comments."));
    }

    #[test]
    fn empty_job_fields_are_allowed() {
        let s = prepare_instructions("", "");
        assert!(s.contains("The job title is: \n"));
    }

    #[test]
    fn format_names_every_category() {
        for key in ["overallScore", "ATS", "toneAndStyle", "content", "structure", "skills"] {
            assert!(AI_RESPONSE_FORMAT.contains(key), "missing {key}");
        }
    }
}
