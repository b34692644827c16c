use crate::client::{Client, ClientError};
use std::time::Duration;

/// A settable field of a configuration struct.
///
/// `Opt*` targets are the pointer-field analog: filled with `Some` on a
/// hit, left `None` on an optional miss.
pub enum Target<'a> {
    Bool(&'a mut bool),
    Int(&'a mut i64),
    Uint(&'a mut u64),
    Float(&'a mut f64),
    Text(&'a mut String),
    Duration(&'a mut Duration),
    OptBool(&'a mut Option<bool>),
    OptInt(&'a mut Option<i64>),
    OptUint(&'a mut Option<u64>),
    OptFloat(&'a mut Option<f64>),
    OptText(&'a mut Option<String>),
    OptDuration(&'a mut Option<Duration>),
}

/// One field descriptor: the variable name it binds to, an optional name
/// override, the requiredness and the typed destination.
pub struct Field<'a> {
    name: String,
    key: Option<String>,
    required: bool,
    target: Target<'a>,
}

impl<'a> Field<'a> {
    /// Override the variable name used for the lookup.
    pub fn key(&mut self, key: impl Into<String>) -> &mut Self {
        self.key = Some(key.into());
        self
    }

    /// Turn a miss on this field into an error instead of a default.
    pub fn required(&mut self) -> &mut Self {
        self.required = true;
        self
    }
}

/// Ordered list of field descriptors to feed from a [`Client`].
#[derive(Default)]
pub struct Bindings<'a> {
    fields: Vec<Field<'a>>,
}

impl<'a> Bindings<'a> {
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Describe one field; chain [`Field::key`] and [`Field::required`] on
    /// the result.
    pub fn bind(&mut self, name: impl Into<String>, target: Target<'a>) -> &mut Field<'a> {
        self.fields.push(Field {
            name: name.into(),
            key: None,
            required: false,
            target,
        });
        let last = self.fields.len() - 1;
        &mut self.fields[last]
    }
}

impl Client {
    /// Feed every described field from the handler chain.
    ///
    /// Each field is fetched through the accessor matching its target kind;
    /// a duration field falls back from the integer accessor to text like
    /// `"300ms"`. A miss on a required field surfaces the error; a miss on
    /// an optional field leaves the destination as it was.
    pub async fn process(&self, bindings: Bindings<'_>) -> Result<(), ClientError> {
        for field in bindings.fields {
            let Field {
                name,
                key,
                required,
                target,
            } = field;
            let key = key.unwrap_or(name);
            self.feed(&key, required, target).await?;
        }
        Ok(())
    }

    /// Like [`Client::process`] but aborts on any error.
    pub async fn must_process(&self, bindings: Bindings<'_>) {
        if let Err(e) = self.process(bindings).await {
            panic!("confcast: {}", e);
        }
    }

    async fn feed(
        &self,
        key: &str,
        required: bool,
        target: Target<'_>,
    ) -> Result<(), ClientError> {
        match target {
            Target::Bool(slot) => match self.get_bool(key).await {
                Ok(v) => *slot = v,
                Err(e) if required => return Err(e),
                Err(_) => {}
            },
            Target::Int(slot) => match self.get_int(key).await {
                Ok(v) => *slot = v,
                Err(e) if required => return Err(e),
                Err(_) => {}
            },
            Target::Uint(slot) => match self.get_uint(key).await {
                Ok(v) => *slot = v,
                Err(e) if required => return Err(e),
                Err(_) => {}
            },
            Target::Float(slot) => match self.get_float(key).await {
                Ok(v) => *slot = v,
                Err(e) if required => return Err(e),
                Err(_) => {}
            },
            Target::Text(slot) => match self.get_string(key).await {
                Ok(v) => *slot = v,
                Err(e) if required => return Err(e),
                Err(_) => {}
            },
            Target::Duration(slot) => match self.get_duration(key).await {
                Ok(v) => *slot = v,
                Err(e) if required => return Err(e),
                Err(_) => {}
            },
            Target::OptBool(slot) => match self.get_bool(key).await {
                Ok(v) => *slot = Some(v),
                Err(e) if required => return Err(e),
                Err(_) => {}
            },
            Target::OptInt(slot) => match self.get_int(key).await {
                Ok(v) => *slot = Some(v),
                Err(e) if required => return Err(e),
                Err(_) => {}
            },
            Target::OptUint(slot) => match self.get_uint(key).await {
                Ok(v) => *slot = Some(v),
                Err(e) if required => return Err(e),
                Err(_) => {}
            },
            Target::OptFloat(slot) => match self.get_float(key).await {
                Ok(v) => *slot = Some(v),
                Err(e) if required => return Err(e),
                Err(_) => {}
            },
            Target::OptText(slot) => match self.get_string(key).await {
                Ok(v) => *slot = Some(v),
                Err(e) if required => return Err(e),
                Err(_) => {}
            },
            Target::OptDuration(slot) => match self.get_duration(key).await {
                Ok(v) => *slot = Some(v),
                Err(e) if required => return Err(e),
                Err(_) => {}
            },
        }
        Ok(())
    }

    async fn get_uint(&self, key: &str) -> Result<u64, ClientError> {
        let v = self.get_int(key).await?;
        u64::try_from(v).map_err(|_| ClientError::Invalid)
    }

    /// Duration as integer nanoseconds, or as text like `"300ms"`.
    async fn get_duration(&self, key: &str) -> Result<Duration, ClientError> {
        match self.get_int(key).await {
            Ok(n) => u64::try_from(n)
                .map(Duration::from_nanos)
                .map_err(|_| ClientError::Invalid),
            Err(_) => {
                let s = self.get_string(key).await?;
                humantime::parse_duration(&s).map_err(|_| ClientError::Invalid)
            }
        }
    }
}
