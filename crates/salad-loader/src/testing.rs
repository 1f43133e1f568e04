use crate::context::{LoadContext, LoadSession};
use crate::fetch::StaticFetcher;
use crate::options::LoadOptions;
use crate::registry::{Registry, RegistryBuilder};
use crate::vocab::Vocabulary;

pub(crate) fn empty_registry() -> Registry {
    RegistryBuilder::new(Vocabulary::new()).build().unwrap()
}

/// Run `f` with a fresh session rooted at `file:///test.yml`.
pub(crate) fn with_context<R>(
    registry: &Registry,
    options: LoadOptions,
    f: impl FnOnce(&LoadContext<'_>) -> R,
) -> R {
    let fetcher = StaticFetcher::default();
    let session = LoadSession::new(registry, &fetcher, &options);
    let ctx = LoadContext::new(&session, "file:///test.yml");
    f(&ctx)
}
