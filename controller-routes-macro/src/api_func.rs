use darling::{ast::NestedMeta, FromMeta};
use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{parse_macro_input, Attribute, FnArg, ItemFn, Pat, Type};

/// Parameters that receive the handler context instead of an argument.
const CONTEXT_NAMES: [&str; 2] = ["context", "request"];

#[derive(Debug, Default, FromMeta)]
struct ApiFuncArgs {
    #[darling(default)]
    name: Option<String>,
}

pub fn api_func_attribute(attr: TokenStream, item: TokenStream) -> TokenStream {
    let meta = match NestedMeta::parse_meta_list(attr.into()) {
        Ok(meta) => meta,
        Err(e) => return TokenStream::from(darling::Error::from(e).write_errors()),
    };
    let args = match ApiFuncArgs::from_list(&meta) {
        Ok(args) => args,
        Err(e) => return TokenStream::from(e.write_errors()),
    };
    let input = parse_macro_input!(item as ItemFn);
    match generate_api_func(&args, input) {
        Ok(expanded) => TokenStream::from(expanded),
        Err(e) => TokenStream::from(e.to_compile_error()),
    }
}

struct HandlerParam {
    ident: syn::Ident,
    ty: Type,
    context: bool,
    query: bool,
    keyword_only: bool,
    optional: bool,
}

fn generate_api_func(args: &ApiFuncArgs, mut input: ItemFn) -> syn::Result<TokenStream2> {
    if !input.sig.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.sig.generics,
            "#[api_func] handlers cannot be generic",
        ));
    }

    let params = collect_params(&mut input)?;
    let fn_name = &input.sig.ident;
    let vis = &input.vis;
    let ctor = format_ident!("{}_api", fn_name);
    let handler_name = args.name.clone().unwrap_or_else(|| fn_name.to_string());
    let is_async = input.sig.asyncness.is_some();

    let descriptors = params.iter().map(param_descriptor);

    let mut bindings = Vec::new();
    let mut call_args = Vec::new();
    for (i, param) in params.iter().enumerate() {
        if param.context {
            call_args.push(quote! { &__ctx });
            continue;
        }
        let binding = format_ident!("__arg_{}", i);
        let ty = &param.ty;
        let name = param.ident.to_string();
        let extract = if param.query {
            quote! { __ctx.query_arg::<#ty>(#name)? }
        } else {
            quote! { __ctx.arg::<#ty>(#name)? }
        };
        bindings.push(quote! { let #binding: #ty = #extract; });
        call_args.push(quote! { #binding });
    }

    let body = if is_async {
        quote! {
            #[allow(unused_variables)]
            async fn __call(
                __ctx: ::controller_routes::handler::HandlerContext,
            ) -> ::controller_routes::Result<::controller_routes::handler::Value> {
                #(#bindings)*
                let output = #fn_name(#(#call_args),*).await?;
                ::controller_routes::handler::to_output(output)
            }
            ::controller_routes::handler::ApiFunc::asynchronous(#handler_name, signature, __call)
        }
    } else {
        quote! {
            #[allow(unused_variables)]
            fn __call(
                __ctx: ::controller_routes::handler::HandlerContext,
            ) -> ::controller_routes::Result<::controller_routes::handler::Value> {
                #(#bindings)*
                let output = #fn_name(#(#call_args),*)?;
                ::controller_routes::handler::to_output(output)
            }
            ::controller_routes::handler::ApiFunc::sync(#handler_name, signature, __call)
        }
    };

    Ok(quote! {
        #input

        #vis fn #ctor() -> ::controller_routes::handler::ApiFunc {
            let signature = ::controller_routes::signature::Signature::new(::std::vec![
                #(#descriptors),*
            ]);
            #body
        }
    })
}

/// Reads the parameter list, stripping `#[query]` and `#[keyword]`, and
/// rejects orderings the generated signature could not express.
fn collect_params(input: &mut ItemFn) -> syn::Result<Vec<HandlerParam>> {
    let mut params = Vec::new();
    let mut keyword_seen = false;
    let mut default_seen = false;

    for arg in input.sig.inputs.iter_mut() {
        let pat_type = match arg {
            FnArg::Receiver(receiver) => {
                return Err(syn::Error::new_spanned(
                    receiver,
                    "#[api_func] handlers are free functions; take `context: &HandlerContext` instead of `self`",
                ))
            }
            FnArg::Typed(pat_type) => pat_type,
        };
        let ident = match pat_type.pat.as_ref() {
            Pat::Ident(pat_ident) => pat_ident.ident.clone(),
            other => {
                return Err(syn::Error::new_spanned(
                    other,
                    "#[api_func] parameters must be plain identifiers",
                ))
            }
        };

        let query = take_attr(&mut pat_type.attrs, "query");
        let keyword_only = take_attr(&mut pat_type.attrs, "keyword");
        let context = CONTEXT_NAMES.contains(&ident.to_string().as_str());
        if context && !matches!(pat_type.ty.as_ref(), Type::Reference(_)) {
            return Err(syn::Error::new_spanned(
                &pat_type.ty,
                "`context` and `request` parameters must be `&HandlerContext`",
            ));
        }
        let optional = !context && is_option(&pat_type.ty);
        let has_default = query || optional;

        if keyword_only {
            keyword_seen = true;
        } else {
            if keyword_seen {
                return Err(syn::Error::new_spanned(
                    &ident,
                    "positional parameters must come before #[keyword] parameters",
                ));
            }
            if default_seen && !has_default {
                return Err(syn::Error::new_spanned(
                    &ident,
                    "a required parameter cannot follow an optional or #[query] parameter",
                ));
            }
            default_seen |= has_default;
        }

        params.push(HandlerParam {
            ident,
            ty: (*pat_type.ty).clone(),
            context,
            query,
            keyword_only,
            optional,
        });
    }

    if params.iter().filter(|param| param.query).count() > 1 {
        return Err(syn::Error::new_spanned(
            &input.sig.ident,
            "a handler may declare at most one #[query] parameter",
        ));
    }
    Ok(params)
}

fn param_descriptor(param: &HandlerParam) -> TokenStream2 {
    let name = param.ident.to_string();
    let ty = &param.ty;
    let type_name = quote!(#ty).to_string();
    let kind = if param.keyword_only {
        quote!(KeywordOnly)
    } else {
        quote!(PositionalOrKeyword)
    };
    let default = if param.query {
        quote!(.query())
    } else if param.optional {
        quote!(.with_default(::controller_routes::handler::Value::Null))
    } else {
        quote!()
    };
    quote! {
        ::controller_routes::signature::Param::new(
            #name,
            ::controller_routes::signature::ParamKind::#kind,
        )
        .annotated(::controller_routes::signature::TypeRef::from_type_name(#type_name))
        #default
    }
}

fn take_attr(attrs: &mut Vec<Attribute>, name: &str) -> bool {
    let before = attrs.len();
    attrs.retain(|attr| !attr.path().is_ident(name));
    attrs.len() != before
}

fn is_option(ty: &Type) -> bool {
    if let Type::Path(type_path) = ty {
        if let Some(segment) = type_path.path.segments.last() {
            return segment.ident == "Option";
        }
    }
    false
}
