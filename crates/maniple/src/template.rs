//! CloudFormation template of a resolved lambda function
//!
//! Local runners (`sam local`, ...) only understand CloudFormation. Properties are copied from the terraform
//! attribute of the same name in snake_case, `Code` points to the zipped package.
use crate::resolver::LambdaAttributes;
use crate::value::{Object, Value};

pub const RESOURCE_TYPE: &str = "AWS::Lambda::Function";

/// Properties and their values when terraform does not set them
fn properties() -> [(&'static str, Value); 8] {
    [
        ("Code", Value::Object(Object::new())),
        ("Environment", Value::Object(Object::new())),
        ("FunctionName", "".into()),
        ("Handler", "".into()),
        ("MemorySize", Value::Integer(128)),
        ("Role", "".into()),
        ("Runtime", "".into()),
        ("Timeout", Value::Integer(1)),
    ]
}

pub fn to_cloudformation(attributes: &LambdaAttributes, package: &str) -> Value {
    let mut properties: Object = properties()
        .into_iter()
        .map(|(property, default)| {
            let value = attributes
                .get(&snake_case(property))
                .cloned()
                .unwrap_or(default);
            (property.to_string(), value)
        })
        .collect();

    properties.insert("Code".to_string(), format!("{package}.zip").into());

    Value::Object(Object::from([
        ("Type".to_string(), RESOURCE_TYPE.into()),
        ("Properties".to_string(), Value::Object(properties)),
    ]))
}

fn snake_case(camel_case: &str) -> String {
    let mut snake_case = String::with_capacity(camel_case.len() + 4);
    for (index, c) in camel_case.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if index > 0 {
                snake_case.push('_');
            }
            snake_case.push(c.to_ascii_lowercase());
        } else {
            snake_case.push(c);
        }
    }
    snake_case
}
