//! Constructors for the documents the reconcilers provision most often.

use crate::document::PolicyDocument;
use crate::effect::Effect;
use crate::serutil::StringList;
use crate::statement::{Principal, Statement};

/// Allow statement over explicit actions and resources.
pub fn allow_statement(
    actions: impl Into<StringList>,
    resources: impl Into<StringList>,
) -> Statement {
    Statement::new(Effect::Allow, actions).with_resource(resources)
}

/// Read/write/list access to a single bucket and its objects.
pub fn bucket_access_policy(bucket: &str) -> PolicyDocument {
    let object_arn = format!("arn:aws:s3:::{bucket}/*");
    let bucket_arn = format!("arn:aws:s3:::{bucket}");
    PolicyDocument::from_statements(vec![
        allow_statement(
            ["s3:GetObject", "s3:PutObject", "s3:DeleteObject"],
            StringList::from(object_arn),
        ),
        allow_statement(
            ["s3:ListBucket", "s3:GetBucketLocation"],
            StringList::from(bucket_arn),
        ),
    ])
}

/// Trust document letting a service principal assume the role.
pub fn service_trust_policy(service: &str) -> PolicyDocument {
    PolicyDocument::from_statement(
        Statement::new(Effect::Allow, "sts:AssumeRole").with_principal(Principal::service(service)),
    )
}
