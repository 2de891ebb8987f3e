pub mod directives;
pub mod frontmatter;
