use v_utils::macros as v_macros;

fn __default_output_root() -> String {
	"fixtures".to_string()
}

#[derive(Clone, Debug, Default, v_macros::LiveSettings, v_macros::MyConfigPrimitives, v_macros::Settings)]
pub struct AppConfig {
	/// Where scenarios are generated when `--output` is not given.
	#[primitives(skip)]
	#[serde(default = "__default_output_root")]
	pub output_root: String,
	/// Mark scenario roots with a real `git init` instead of the fixed skeleton.
	#[primitives(skip)]
	#[serde(default)]
	pub use_git_init: bool,
}
