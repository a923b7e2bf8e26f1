use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::buffers::Buffers;
use crate::config::SourceConfig;
use crate::matcher::Matcher;
use crate::protocol::{CompleteOption, CompleteResult};
use crate::sources::{first_match_filter, scan_result, Source, SourceError, SourceSettings};

/// Words from the lines surrounding the cursor, nearest first.
pub struct AroundSource {
    settings: SourceSettings,
    buffers: Buffers,
    matcher: Matcher,
    lines: usize,
}

impl AroundSource {
    pub const NAME: &'static str = "around";

    pub fn new(config: &SourceConfig, buffers: Buffers, matcher: Matcher, lines: usize) -> Self {
        Self {
            settings: SourceSettings::from_config(config, "A", 2),
            buffers,
            matcher,
            lines,
        }
    }
}

#[async_trait]
impl Source for AroundSource {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn settings(&self) -> &SourceSettings {
        &self.settings
    }

    async fn do_complete(
        &self,
        opt: &CompleteOption,
        token: &CancellationToken,
    ) -> Result<Option<CompleteResult>, SourceError> {
        let words = self
            .buffers
            .words_around(opt.bufnr, opt.linenr, self.lines)
            .await;
        let candidates: Vec<&String> = words
            .iter()
            .filter(|word| first_match_filter(&self.settings, &opt.input, word))
            .collect();

        let mut items = self.matcher.new_set();
        let outcome = self
            .matcher
            .get_results([candidates], &opt.input, Some(opt.word.as_str()), &mut items, token)
            .await;
        Ok(scan_result(Self::NAME, &self.settings, items, outcome))
    }
}
