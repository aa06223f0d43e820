// Prompt module
// Wraps retrieved context and the user's question in the answering instructions


use tracing::debug;

/// Build the prompt sent to the completion provider for a question that has context.
///
/// Both `context` and `query` are embedded verbatim.
#[inline]
pub fn augment(context: &str, query: &str) -> String {
    let prompt = format!(
        "Answer the question using only the information in the context below.\n\
         First work out from the context which product the question is about: its name, \
         part number and the appliance it belongs to.\n\
         Refrigerator parts never fit dishwashers and dishwasher parts never fit \
         refrigerators, so never say a part works with both.\n\
         If the question asks whether a part is compatible with a model and does not say \
         whether that model is a refrigerator or a dishwasher, ask which one it is before \
         answering.\n\
         If the context does not contain the answer, say so and ask for more details.\n\n\
         Context:\n{context}\n\n\
         Question:\n{query}"
    );
    debug!(
        "Augmented prompt has {} chars of context and {} chars of query",
        context.len(),
        query.len()
    );
    prompt
}
