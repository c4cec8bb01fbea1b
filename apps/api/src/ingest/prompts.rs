// Ingestion prompt templates. Placeholders are filled with `str::replace`.

/// Schema inference. Replace `{jd_text}` and `{json_only}` before sending.
pub const COLUMNS_PROMPT_TEMPLATE: &str = r#"Analyze this job description and determine what columns should be in a candidates database table.
Return ONLY a JSON array of column names that would be useful for storing candidate information relevant to this job.
Include standard fields like name, email, phone, skills, experience, education, etc.
Example format: ["name", "email", "phone", "skills", "experience", "education", "linkedin"]

{json_only}

Job Description:
{jd_text}"#;

/// Field extraction. Replace `{jd_text}`, `{resume_text}`, `{fields}` and `{json_only}`.
pub const EXTRACTION_PROMPT_TEMPLATE: &str = r#"Extract candidate information from this resume based on the job description requirements.

Job Description:
{jd_text}

Resume Text:
{resume_text}

Extract information for these specific fields: {fields}

Return ONLY a JSON object with the extracted information, using exactly the field names above as keys.
Map the resume content to the required fields.
For skills, include relevant technical skills, programming languages, frameworks, tools mentioned.
For experience, summarize relevant work history and projects.
For education, include degrees, certifications, relevant coursework.
If a field cannot be found in the resume, use an empty string.

Example format: {"name": "John Doe", "email": "john@email.com", "skills": "Python, Machine Learning, AWS", "experience": "5 years in AI development"}

{json_only}"#;

/// Match scoring. Replace `{candidate_json}` and `{jd_text}`.
pub const SCORE_PROMPT_TEMPLATE: &str = r#"Calculate a match score (0-100) between this candidate and job description.
Return ONLY the score number as a float. No words, no units, no explanation.

Candidate: {candidate_json}

Job Description: {jd_text}"#;
