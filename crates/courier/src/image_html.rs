//! HTML bodies whose image and script references are embedded
//! automatically.

use crate::body::{Body, BuildContext, Stage};
use crate::email::Email;
use crate::error::Result;
use crate::html::{AsHtml, HtmlBody, assemble, set_text_and_html};
use crate::multipart::{AsMultipart, MultipartBody, apply_sub_type};
use crate::resolver::DataSourceResolver;
use courier_mime::{DataSource, Multipart};
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;

const IMG_PATTERN: &str = r#"(?i)(<img\s*[^>]*?\s+src\s*=\s*["'])([^"']+?)(["'])"#;
const SCRIPT_PATTERN: &str = r#"(?i)(<script\s*[^>]*?\s+src\s*=\s*["'])([^"']+?)(["'])"#;

/// Finds `src` attributes of one element kind.
#[derive(Debug, Clone)]
pub struct SrcMatcher {
    regex: Regex,
}

impl SrcMatcher {
    /// Matches `<img ... src="...">`.
    ///
    /// # Errors
    ///
    /// Returns an error if the pattern fails to compile.
    pub fn img() -> Result<Self> {
        Ok(Self {
            regex: Regex::new(IMG_PATTERN)?,
        })
    }

    /// Matches `<script ... src="...">`.
    ///
    /// # Errors
    ///
    /// Returns an error if the pattern fails to compile.
    pub fn script() -> Result<Self> {
        Ok(Self {
            regex: Regex::new(SCRIPT_PATTERN)?,
        })
    }

    /// Returns the referenced locations in document order.
    pub fn locations<'h>(&self, html: &'h str) -> impl Iterator<Item = &'h str> {
        self.regex
            .captures_iter(html)
            .filter_map(|caps| caps.get(2).map(|m| m.as_str()))
    }

    /// Rewrites each reference for which `replace` returns a Content-ID to
    /// `cid:<id>`, keeping the quotes. Other references are left as they
    /// are.
    ///
    /// # Errors
    ///
    /// Returns the first error from `replace`.
    pub fn rewrite<F>(&self, html: &str, mut replace: F) -> Result<String>
    where
        F: FnMut(&str) -> Result<Option<String>>,
    {
        let mut out = String::with_capacity(html.len());
        let mut last = 0;
        for caps in self.regex.captures_iter(html) {
            let (Some(whole), Some(prefix), Some(location), Some(quote)) =
                (caps.get(0), caps.get(1), caps.get(2), caps.get(3))
            else {
                continue;
            };
            let Some(cid) = replace(location.as_str())? else {
                continue;
            };
            out.push_str(&html[last..whole.start()]);
            out.push_str(prefix.as_str());
            out.push_str(&crate::cid::reference(&cid));
            out.push_str(quote.as_str());
            last = whole.end();
        }
        out.push_str(&html[last..]);
        Ok(out)
    }
}

/// HTML body that embeds resources referenced from `<img>` and `<script>`
/// elements at build time.
#[derive(Debug, Default)]
pub struct ImageHtmlBody {
    html: HtmlBody,
    resolver: Option<Arc<dyn DataSourceResolver>>,
}

impl AsMultipart for ImageHtmlBody {
    fn multipart(&self) -> &MultipartBody {
        self.html.multipart()
    }

    fn multipart_mut(&mut self) -> &mut MultipartBody {
        self.html.multipart_mut()
    }
}

impl AsHtml for ImageHtmlBody {
    fn html_body(&self) -> &HtmlBody {
        &self.html
    }

    fn html_body_mut(&mut self) -> &mut HtmlBody {
        &mut self.html
    }
}

impl Body for ImageHtmlBody {
    fn stages() -> Vec<Stage<Self>> {
        vec![
            Stage::new("resolve embedded resources", resolve_resources),
            Stage::new("assemble html body", assemble::<Self>),
            Stage::new("apply multipart subtype", apply_sub_type::<Self>),
        ]
    }

    fn set_msg(email: &mut Email<Self>, msg: &str) -> Result<()> {
        set_text_and_html(email, msg)
    }

    fn take_container(&mut self) -> Option<Multipart> {
        self.html.take_container()
    }
}

impl Email<ImageHtmlBody> {
    /// Sets the resolver used to turn references into resources.
    pub fn set_data_source_resolver(&mut self, resolver: Arc<dyn DataSourceResolver>) -> &mut Self {
        self.body.resolver = Some(resolver);
        self
    }

    /// Returns the resolver.
    #[must_use]
    pub const fn data_source_resolver(&self) -> Option<&Arc<dyn DataSourceResolver>> {
        self.body.resolver.as_ref()
    }
}

/// Per-build caches: each location is resolved once and each resource
/// name embedded once.
#[derive(Default)]
struct Resolutions {
    sources: HashMap<String, Arc<dyn DataSource>>,
    cids: HashMap<String, String>,
}

impl Resolutions {
    fn cid_for(
        &mut self,
        email: &mut Email<ImageHtmlBody>,
        resolver: &dyn DataSourceResolver,
        location: &str,
    ) -> Result<Option<String>> {
        let source = if let Some(source) = self.sources.get(location) {
            Arc::clone(source)
        } else {
            let Some(source) = resolver.resolve(location)? else {
                tracing::debug!(location, "Leaving unresolved reference");
                return Ok(None);
            };
            self.sources.insert(location.to_string(), Arc::clone(&source));
            source
        };

        let name = source
            .name()
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| location.to_string());
        if let Some(cid) = self.cids.get(&name) {
            return Ok(Some(cid.clone()));
        }
        let cid = email.embed_data_source(source, &name)?;
        self.cids.insert(name, cid.clone());
        Ok(Some(cid))
    }
}

fn resolve_resources(email: &mut Email<ImageHtmlBody>, ctx: &mut BuildContext) -> Result<()> {
    let Some(html) = email.html_msg().filter(|h| !h.is_empty()).map(str::to_string) else {
        return Ok(());
    };
    let Some(resolver) = email.body.resolver.clone() else {
        tracing::debug!("No resolver set, leaving references as they are");
        return Ok(());
    };

    let mut resolutions = Resolutions::default();
    let mut rewritten = html;
    for matcher in [SrcMatcher::img()?, SrcMatcher::script()?] {
        rewritten = matcher.rewrite(&rewritten, |location| {
            resolutions.cid_for(email, resolver.as_ref(), location)
        })?;
    }
    tracing::debug!(
        embedded = email.inline_resources().len(),
        "Resolved embedded resources"
    );
    ctx.html = Some(rewritten);
    Ok(())
}
