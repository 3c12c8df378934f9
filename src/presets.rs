//! Ready-made transformer configurations.
//!
//! None of these are applied implicitly; a caller opts in through [`pipeline`] or by adding
//! individual transformers to a [`PipelineBuilder`].

use std::sync::Arc;

use crate::{
    matcher::{ArtifactPredicate, EntryPredicate, TargetMatcher},
    pipeline::{Features, PipelineBuilder, TransformerPipeline},
    redirections,
    rewriter::{ConstantValue, DispatchTarget},
    transform::{
        CallRedirectionInjector, ConstantReturnPatch, MethodPatch, RedirectConfig,
        ResourceExtraction, ResourceSink,
    },
};

/// The authlib session service performing the server join handshake.
pub const SESSION_SERVICE: &str = "com/mojang/authlib/yggdrasil/YggdrasilMinecraftSessionService";

/// The authlib user API service fetching profile key pairs.
pub const USER_API_SERVICE: &str = "com/mojang/authlib/yggdrasil/YggdrasilUserApiService";

/// Class declaring the static dispatcher rewritten call sites invoke.
pub const DISPATCHER_OWNER: &str = "classweave/runtime/Redirections";

/// Name of the static dispatcher.
pub const DISPATCHER_NAME: &str = "dispatch";

/// Resource holding the host-side runtime support classes.
pub const RUNTIME_RESOURCE: &str = "classweave-runtime.jar";

/// Resource holding the headless LWJGL replacement classes.
pub const LWJGL_RESOURCE: &str = "classweave-lwjgl.jar";

/// Make `joinServer` a no-op and `getKeyPair` return null in authlib artifacts.
///
/// Servers in online mode still reject the connection; the patch only stops the client from
/// contacting the session servers.
#[must_use]
pub fn offline_session() -> ConstantReturnPatch {
    ConstantReturnPatch::new(
        "offline session",
        TargetMatcher::new(
            ArtifactPredicate::PathContains("authlib".to_string()),
            EntryPredicate::classes([SESSION_SERVICE, USER_API_SERVICE]),
        ),
        vec![
            MethodPatch::new(SESSION_SERVICE, "joinServer", ConstantValue::Void),
            MethodPatch::new(USER_API_SERVICE, "getKeyPair", ConstantValue::Null),
        ],
    )
}

/// The default dispatcher location.
#[must_use]
pub fn dispatcher() -> DispatchTarget {
    DispatchTarget::new(DISPATCHER_OWNER, DISPATCHER_NAME)
}

/// Redirect every call covered by [`redirections`] in every class of every artifact.
#[must_use]
pub fn headless_redirects() -> CallRedirectionInjector {
    CallRedirectionInjector::new(
        "headless redirects",
        TargetMatcher::new(
            ArtifactPredicate::Any,
            EntryPredicate::Suffix(".class".to_string()),
        ),
        RedirectConfig::new(dispatcher()).targets(redirections::keys()),
    )
}

/// Extract the runtime support library into `sink`.
#[must_use]
pub fn runtime_extraction(sink: Arc<dyn ResourceSink>) -> ResourceExtraction {
    ResourceExtraction::new(RUNTIME_RESOURCE, sink)
}

/// Extract the headless LWJGL library into `sink`.
#[must_use]
pub fn lwjgl_extraction(sink: Arc<dyn ResourceSink>) -> ResourceExtraction {
    ResourceExtraction::new(LWJGL_RESOURCE, sink)
}

/// The full pipeline for `features`.
#[must_use]
pub fn pipeline(features: Features, sink: Arc<dyn ResourceSink>) -> TransformerPipeline {
    PipelineBuilder::new(features)
        .with(Features::LWJGL, headless_redirects())
        .with(Features::LWJGL, lwjgl_extraction(sink.clone()))
        .with(Features::RUNTIME, runtime_extraction(sink))
        .with(Features::NO_AUTH, offline_session())
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::{DirectorySink, Transform, TransformKind};
    use std::path::Path;

    #[test]
    fn offline_session_targets_authlib_only() {
        let patch = offline_session();
        let matcher = patch.matcher();
        assert!(matcher.matches_artifact(Path::new("libraries/com/mojang/authlib-6.0.54.jar")));
        assert!(matcher.matches_artifact(Path::new("AUTHLIB.jar")));
        assert!(!matcher.matches_artifact(Path::new("libraries/lwjgl-3.3.3.jar")));
        assert!(matcher.matches_entry(&format!("{SESSION_SERVICE}.class")));
        assert!(matcher.matches_entry(&format!("{USER_API_SERVICE}.class")));
        assert_eq!(patch.patches().len(), 2);
    }

    #[test]
    fn pipeline_follows_features() {
        let sink = Arc::new(DirectorySink::new("unused"));
        let kinds = |features| -> Vec<TransformKind> {
            pipeline(features, sink.clone())
                .transformers()
                .iter()
                .map(|transformer| transformer.kind())
                .collect()
        };

        assert!(kinds(Features::empty()).is_empty());
        assert_eq!(
            kinds(Features::LWJGL),
            [TransformKind::Redirect, TransformKind::ExtractResource]
        );
        assert_eq!(
            kinds(Features::headless()),
            [
                TransformKind::Redirect,
                TransformKind::ExtractResource,
                TransformKind::ExtractResource
            ]
        );
        assert_eq!(kinds(Features::all()).len(), 4);
    }

    #[test]
    fn extractions_name_their_resources() {
        let sink: Arc<dyn ResourceSink> = Arc::new(DirectorySink::new("unused"));
        let lwjgl = lwjgl_extraction(sink.clone());
        let runtime = runtime_extraction(sink);
        assert!(lwjgl.matcher().matches_entry(LWJGL_RESOURCE));
        assert!(!lwjgl.matcher().matches_entry(RUNTIME_RESOURCE));
        assert!(runtime.matcher().matches_entry(RUNTIME_RESOURCE));
    }

    #[test]
    fn redirects_cover_registered_keys() {
        let injector = headless_redirects();
        assert_eq!(injector.config().targets.len(), redirections::keys().len());
        assert_eq!(injector.config().dispatcher, dispatcher());
    }
}
