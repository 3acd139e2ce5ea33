//! Placeholder templates for identity-provider logout URLs.

// std
use std::sync::LazyLock;
// crates.io
use regex::Regex;
use url::form_urlencoded;
// self
use crate::_prelude::*;

/// Variables an OIDC logout template may reference.
pub const LOGOUT_VARIABLES: [&str; 4] = ["Token", "ClientID", "URL", "LogoutReturnURL"];
/// Message shown to the user when the identity provider sends them back after logout.
pub const LOGOUT_RETURN_MESSAGE: &str = "You successfully logged out from the OIDC provider";

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"\{\{\s*([A-Za-z0-9_]+)\s*\}\}").expect("Placeholder pattern should be a valid regex.")
});

/// Template parsing and rendering failures.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum TemplateError {
	/// The template references a variable outside the allow-list.
	#[error("Unknown variable `{name}` in template.")]
	UnknownVariable {
		/// Offending variable.
		name: String,
	},
	/// A referenced variable was not supplied at render time.
	#[error("Required variable `{name}` is missing.")]
	MissingVariable {
		/// Missing variable.
		name: String,
	},
	/// The rendered output is not an absolute URL.
	#[error("Rendered URL is invalid: {reason}.")]
	InvalidUrl {
		/// Underlying parser message.
		reason: String,
	},
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Segment {
	Literal(String),
	Variable(String),
}

/// Template with `{{ Name }}` placeholders, validated against an allow-list when parsed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogoutTemplate {
	segments: Vec<Segment>,
}
impl LogoutTemplate {
	/// Parses `template`, rejecting any placeholder not listed in `allowed`.
	///
	/// Whitespace inside the braces is ignored, so `{{Token}}` and `{{ Token }}` are equivalent.
	pub fn parse(template: &str, allowed: &[&str]) -> Result<Self, TemplateError> {
		let mut segments = Vec::new();
		let mut cursor = 0;

		for captures in PLACEHOLDER.captures_iter(template) {
			let (Some(whole), Some(name)) = (captures.get(0), captures.get(1)) else {
				continue;
			};

			if !allowed.contains(&name.as_str()) {
				return Err(TemplateError::UnknownVariable { name: name.as_str().into() });
			}
			if whole.start() > cursor {
				segments.push(Segment::Literal(template[cursor..whole.start()].into()));
			}

			segments.push(Segment::Variable(name.as_str().into()));
			cursor = whole.end();
		}

		if cursor < template.len() {
			segments.push(Segment::Literal(template[cursor..].into()));
		}

		Ok(Self { segments })
	}

	/// Returns `true` for a template that renders to nothing.
	pub fn is_empty(&self) -> bool {
		self.segments.is_empty()
	}

	/// Variables referenced by the template, in order of appearance.
	pub fn variables(&self) -> impl Iterator<Item = &str> {
		self.segments.iter().filter_map(|segment| match segment {
			Segment::Variable(name) => Some(name.as_str()),
			Segment::Literal(_) => None,
		})
	}

	/// Substitutes query-escaped `values` and validates the result as a URL.
	///
	/// An empty template renders to an empty string without validation.
	pub fn render(&self, values: &HashMap<&str, &str>) -> Result<String, TemplateError> {
		if let Some(name) = self.variables().find(|name| !values.contains_key(name)) {
			return Err(TemplateError::MissingVariable { name: name.into() });
		}
		if self.is_empty() {
			return Ok(String::new());
		}

		let rendered = self
			.segments
			.iter()
			.map(|segment| match segment {
				Segment::Literal(text) => text.clone(),
				Segment::Variable(name) =>
					form_urlencoded::byte_serialize(values[name.as_str()].as_bytes()).collect(),
			})
			.collect::<String>();

		Url::parse(&rendered).map_err(|e| TemplateError::InvalidUrl { reason: e.to_string() })?;

		Ok(rendered)
	}
}

/// Binds the OIDC logout variables for one gateway.
#[derive(Clone, Debug)]
pub struct LogoutUrlBuilder {
	template: LogoutTemplate,
	client_id: String,
	server_url: String,
	logout_return_url: String,
}
impl LogoutUrlBuilder {
	/// Parses `template` against [`LOGOUT_VARIABLES`] and derives the post-logout return URL from
	/// `server_url`.
	pub fn new(
		template: &str,
		client_id: impl Into<String>,
		server_url: &str,
	) -> Result<Self, TemplateError> {
		let template = LogoutTemplate::parse(template, &LOGOUT_VARIABLES)?;
		let mut logout_return_url = Url::parse(server_url)
			.map_err(|e| TemplateError::InvalidUrl { reason: e.to_string() })?;

		logout_return_url.query_pairs_mut().clear().append_pair("msg", LOGOUT_RETURN_MESSAGE);

		Ok(Self {
			template,
			client_id: client_id.into(),
			server_url: server_url.into(),
			logout_return_url: logout_return_url.into(),
		})
	}

	/// URL the identity provider should send the user back to.
	pub fn logout_return_url(&self) -> &str {
		&self.logout_return_url
	}

	/// Renders the logout URL for `id_token`; `None` when no logout template is configured.
	pub fn build(&self, id_token: &str) -> Result<Option<String>, TemplateError> {
		if self.template.is_empty() {
			return Ok(None);
		}

		let values = HashMap::from([
			("Token", id_token),
			("ClientID", self.client_id.as_str()),
			("URL", self.server_url.as_str()),
			("LogoutReturnURL", self.logout_return_url.as_str()),
		]);

		self.template.render(&values).map(Some)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn whitespace_inside_braces_is_tolerated() {
		let spaced = LogoutTemplate::parse("https://idp/logout?t={{  Token }}", &["Token"])
			.expect("Spaced template should parse.");
		let tight = LogoutTemplate::parse("https://idp/logout?t={{Token}}", &["Token"])
			.expect("Tight template should parse.");

		assert_eq!(spaced, tight);
		assert_eq!(tight.variables().collect::<Vec<_>>(), ["Token"]);
	}

	#[test]
	fn unknown_variable_fails_at_parse_time() {
		let err = LogoutTemplate::parse("https://idp/?x={{Secret}}", &LOGOUT_VARIABLES)
			.expect_err("Unknown variable should fail.");

		assert_eq!(err, TemplateError::UnknownVariable { name: "Secret".into() });
	}

	#[test]
	fn render_escapes_values_and_requires_every_variable() {
		let template = LogoutTemplate::parse("https://idp/logout?a={{A}}&b={{B}}", &["A", "B"])
			.expect("Template should parse.");
		let err = template
			.render(&HashMap::from([("A", "x")]))
			.expect_err("Missing variable should fail.");

		assert_eq!(err, TemplateError::MissingVariable { name: "B".into() });

		let rendered = template
			.render(&HashMap::from([("A", "a b&c"), ("B", "https://x/?q=1")]))
			.expect("Template should render.");

		assert_eq!(rendered, "https://idp/logout?a=a+b%26c&b=https%3A%2F%2Fx%2F%3Fq%3D1");
	}

	#[test]
	fn non_url_output_is_rejected() {
		let template =
			LogoutTemplate::parse("not a url {{A}}", &["A"]).expect("Template should parse.");

		assert!(matches!(
			template.render(&HashMap::from([("A", "x")])),
			Err(TemplateError::InvalidUrl { .. })
		));
	}

	#[test]
	fn builder_binds_oidc_variables() {
		let builder = LogoutUrlBuilder::new(
			"https://idp.example.com/v2/logout?client_id={{ClientID}}&returnTo={{LogoutReturnURL}}",
			"authgate",
			"https://gateway.example.com",
		)
		.expect("Logout builder should be created.");

		assert_eq!(
			builder.logout_return_url(),
			"https://gateway.example.com/?msg=You+successfully+logged+out+from+the+OIDC+provider"
		);
		assert_eq!(
			builder.build("id-token").expect("Logout URL should render."),
			Some(
				"https://idp.example.com/v2/logout?client_id=authgate&returnTo=https%3A%2F%2Fgateway.example.com%2F%3Fmsg%3DYou%2Bsuccessfully%2Blogged%2Bout%2Bfrom%2Bthe%2BOIDC%2Bprovider"
					.into()
			)
		);
	}

	#[test]
	fn empty_template_means_no_logout_url() {
		let builder = LogoutUrlBuilder::new("", "authgate", "https://gateway.example.com")
			.expect("Empty template should be accepted.");

		assert_eq!(builder.build("id-token").expect("Empty template should render."), None);
	}
}
