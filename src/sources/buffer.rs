use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::buffers::Buffers;
use crate::config::SourceConfig;
use crate::matcher::Matcher;
use crate::protocol::{CompleteOption, CompleteResult};
use crate::sources::{first_match_filter, scan_result, Source, SourceError, SourceSettings};

/// Words of every attached buffer, the current one first.
pub struct BufferSource {
    settings: SourceSettings,
    buffers: Buffers,
    matcher: Matcher,
}

impl BufferSource {
    pub const NAME: &'static str = "buffer";

    pub fn new(config: &SourceConfig, buffers: Buffers, matcher: Matcher) -> Self {
        Self {
            settings: SourceSettings::from_config(config, "B", 1),
            buffers,
            matcher,
        }
    }
}

#[async_trait]
impl Source for BufferSource {
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
        let streams = self.buffers.streams(opt.bufnr, opt.linenr, &opt.word).await;
        let settings = &self.settings;
        let input = opt.input.as_str();
        let streams = streams.into_iter().map(move |stream| {
            stream.filter(move |word| first_match_filter(settings, input, word))
        });

        let mut items = self.matcher.new_set();
        let outcome = self
            .matcher
            .get_results(streams, input, Some(opt.word.as_str()), &mut items, token)
            .await;
        tracing::debug!(?outcome, found = items.len(), "Buffer source scanned");
        Ok(scan_result(Self::NAME, settings, items, outcome))
    }
}
